//!
//! bloggy CLI binary
//! -----------------
//! Interactive terminal front-end. Runs against an in-process backend (optionally
//! persisted under `--data <dir>`) or, with `--connect <url>`, against a running
//! `bloggy_server`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, EnvFilter};

use bloggy::cli::{Control, Prompt, Shell, HELP};
use bloggy::client::RemoteClient;
use bloggy::config::{flag_value, has_flag, Config};
use bloggy::identity::{AccountStore, AuthProvider, AuthService, LocalAuthProvider, SessionManager, SessionProvider};
use bloggy::repository::ArticleRepository;
use bloggy::storage::{ArticleStore, MemoryStore};
use bloggy::views::ViewContext;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--data <dir>]          # in-process backend, memory only unless --data is given\n  {program} --connect <url>          # talk to a bloggy_server, e.g. http://127.0.0.1:7878\n\n{HELP}"
    );
}

struct EditorPrompt<'a>(&'a mut DefaultEditor);

impl Prompt for EditorPrompt<'_> {
    fn line(&mut self, label: &str) -> Option<String> {
        self.0.readline(label).ok().map(|s| s.trim_end().to_string())
    }

    fn confirm(&mut self, question: &str) -> bool {
        matches!(self.0.readline(&format!("{} [y/N] ", question)).as_deref().map(str::trim), Ok("y") | Ok("Y") | Ok("yes"))
    }
}

async fn build_context(args: &[String], cfg: &Config) -> Result<(ViewContext, String)> {
    let auth: Arc<dyn AuthProvider>;
    let store: Arc<dyn ArticleStore>;
    let ident = match flag_value(args, "--connect") {
        Some(url) => {
            let client = Arc::new(RemoteClient::new(url)?);
            auth = client.clone();
            store = client;
            format!("http:{}", url)
        }
        None => {
            let sessions = SessionManager::new(cfg.session_ttl);
            match &cfg.data_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
                    auth = Arc::new(LocalAuthProvider::new(AuthService::open(dir, sessions)?));
                    store = Arc::new(MemoryStore::open_in(dir)?);
                    format!("local:{}", dir.display())
                }
                None => {
                    auth = Arc::new(LocalAuthProvider::new(AuthService::new(AccountStore::in_memory(), sessions)));
                    store = Arc::new(MemoryStore::new());
                    "local:memory".to_string()
                }
            }
        }
    };
    let session = SessionProvider::start(auth.clone()).await;
    // Commands are discrete, so there are no keystrokes to debounce.
    let ctx = ViewContext::new(ArticleRepository::new(store), session, auth).with_config(cfg).with_debounce(Duration::ZERO);
    Ok((ctx, ident))
}

fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().collect();
    let program = args.remove(0);
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage(&program);
        return Ok(());
    }
    if has_flag(&args, "--connect") && flag_value(&args, "--connect").is_none() {
        eprintln!("--connect requires a URL");
        print_usage(&program);
        std::process::exit(2);
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cfg = Config::load(&args)?;
    let rt = tokio::runtime::Runtime::new()?;
    let (ctx, ident) = rt.block_on(build_context(&args, &cfg))?;
    let mut shell = Shell::new(ctx);
    let mut rl = DefaultEditor::new()?;

    println!("bloggy-cli ({}). Type 'help' for commands.", ident);
    loop {
        let line = match rl.readline(&shell.prompt_label()) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() { continue; }
        let _ = rl.add_history_entry(line.as_str());
        let (control, out) = rt.block_on(shell.execute(&line, &mut EditorPrompt(&mut rl)));
        if !out.is_empty() { println!("{}", out); }
        if control == Control::Quit { break; }
    }
    Ok(())
}

use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use bloggy::config::{has_flag, Config};

const USAGE: &str = "\
Usage: bloggy_server [--port <n>] [--bind <addr>] [--data <dir>] [--session-ttl <secs>]

Environment: BLOGGY_HTTP_PORT, BLOGGY_BIND, BLOGGY_DATA_DIR, BLOGGY_SESSION_TTL_SECS, RUST_LOG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "bloggy", "bloggy {} starting: RUST_LOG='{}'", env!("CARGO_PKG_VERSION"), rust_log);

    let cfg = Config::load(&args)?;
    bloggy::server::run(cfg).await
}

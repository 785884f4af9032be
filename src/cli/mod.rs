//!
//! bloggy terminal front-end
//! -------------------------
//! Command interpreter behind the `bloggy_cli` binary. Each command drives one of
//! the headless views and renders its state as text, so the same flows run against
//! the in-process backend or a remote server.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::time::Duration;

use crate::identity::Identity;
use crate::views::{
    self, AuthOutcome, Confirm, CreateView, DeleteOutcome, DetailState, DetailView, EditLoad, EditView, ListOutcome, ListScope,
    ListState, ListView, LoginView, LogoutOutcome, Notice, Route, SignupView, SubmitOutcome, ViewContext,
};

pub mod outputformatter;

use outputformatter::{render_article, render_article_table, render_notice};

/// Interactive input needed by multi-step commands.
pub trait Prompt {
    /// One line of input; `None` when the user aborts.
    fn line(&mut self, label: &str) -> Option<String>;
    fn confirm(&mut self, question: &str) -> bool;
}

/// Upper bound on waiting for the session provider to see a sign-in or sign-out.
const SESSION_SETTLE: Duration = Duration::from_secs(5);

struct PromptConfirm<'a>(RefCell<&'a mut dyn Prompt>);

impl Confirm for PromptConfirm<'_> {
    fn confirm(&self, prompt: &str) -> bool { self.0.borrow_mut().confirm(prompt) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub const HELP: &str = "\
commands:
  signup <email> <password>   create an account
  login <email> <password>    sign in
  logout                      sign out (asks first)
  whoami                      show the signed-in user
  home                        list all articles
  mine                        list your articles
  search <text...>            filter the current list (empty text clears)
  page <n> | next | prev      move through the current list
  show <id>                   read one article
  create                      write a new article
  edit <id>                   edit one of your articles
  delete <id>                 delete one of your articles
  help                        show this help
  quit | exit                 leave";

pub struct Shell {
    ctx: ViewContext,
    list: ListView,
}

impl Shell {
    pub fn new(ctx: ViewContext) -> Self {
        let list = ListView::new(ctx.clone(), ListScope::Home);
        Self { ctx, list }
    }

    pub fn identity(&self) -> Option<Identity> { self.ctx.identity() }

    pub fn prompt_label(&self) -> String {
        match self.identity() {
            Some(i) => format!("{}> ", i.email),
            None => "bloggy> ".to_string(),
        }
    }

    /// Run one command line and return the text to show.
    pub async fn execute(&mut self, line: &str, prompt: &mut dyn Prompt) -> (Control, String) {
        let line = line.trim();
        let (cmd, rest) = line.split_once(char::is_whitespace).map(|(c, r)| (c, r.trim())).unwrap_or((line, ""));
        let mut out = String::new();
        match cmd.to_ascii_lowercase().as_str() {
            "" => {}
            "quit" | "exit" => return (Control::Quit, out),
            "help" => out.push_str(HELP),
            "signup" => self.signup(rest, &mut out).await,
            "login" => self.login(rest, &mut out).await,
            "logout" => self.logout(prompt, &mut out).await,
            "whoami" => match self.identity() {
                Some(i) => { let _ = write!(out, "{} ({})", i.email, i.id); }
                None => out.push_str("not signed in"),
            },
            "home" => self.open_list(ListScope::Home, &mut out).await,
            "mine" => self.open_list(ListScope::Mine, &mut out).await,
            "search" => {
                let outcome = self.list.set_search(rest).await;
                self.render_list(outcome, &mut out);
            }
            "page" => match rest.parse::<u32>() {
                Ok(n) if n >= 1 => {
                    let outcome = self.list.set_page(n).await;
                    self.render_list(outcome, &mut out);
                }
                _ => out.push_str("usage: page <n>  (n >= 1)"),
            },
            "next" => {
                let outcome = self.list.next_page().await;
                self.render_list(outcome, &mut out);
            }
            "prev" => {
                let outcome = self.list.previous_page().await;
                self.render_list(outcome, &mut out);
            }
            "show" if !rest.is_empty() => self.show(rest, &mut out).await,
            "create" => self.create(prompt, &mut out).await,
            "edit" if !rest.is_empty() => self.edit(rest, prompt, &mut out).await,
            "delete" if !rest.is_empty() => self.delete(rest, prompt, &mut out).await,
            "show" | "edit" | "delete" => { let _ = write!(out, "usage: {} <id>", cmd); }
            other => { let _ = write!(out, "unknown command '{}'; type 'help'", other); }
        }
        (Control::Continue, out)
    }

    async fn signup(&self, args: &str, out: &mut String) {
        let Some((email, password)) = two_args(args) else { out.push_str("usage: signup <email> <password>"); return; };
        let view = SignupView::new(self.ctx.clone());
        view.set_email(email);
        view.set_password(password);
        match view.submit().await {
            AuthOutcome::Success { notice, .. } => out.push_str(&render_notice(&notice)),
            _ => push_form_error(out, view.form().error.as_ref().map(|e| e.user_message())),
        }
    }

    async fn login(&self, args: &str, out: &mut String) {
        let Some((email, password)) = two_args(args) else { out.push_str("usage: login <email> <password>"); return; };
        let view = LoginView::new(self.ctx.clone());
        view.set_email(email);
        view.set_password(password);
        match view.submit().await {
            AuthOutcome::Success { notice, .. } => {
                self.ctx.session.settle(true, SESSION_SETTLE).await;
                out.push_str(&render_notice(&notice));
            }
            AuthOutcome::Failed { notice: Some(n) } => out.push_str(&render_notice(&n)),
            _ => push_form_error(out, view.form().error.as_ref().map(|e| e.user_message())),
        }
    }

    async fn logout(&self, prompt: &mut dyn Prompt, out: &mut String) {
        if self.identity().is_none() {
            out.push_str("not signed in");
            return;
        }
        let confirm = PromptConfirm(RefCell::new(prompt));
        match views::logout(&self.ctx, &confirm).await {
            Ok(LogoutOutcome::Cancelled) => out.push_str("cancelled"),
            Ok(LogoutOutcome::SignedOut { notice, .. }) => {
                self.ctx.session.settle(false, SESSION_SETTLE).await;
                out.push_str(&render_notice(&notice));
            }
            Err(e) => out.push_str(&render_notice(&Notice::error(e.user_message()))),
        }
    }

    async fn open_list(&mut self, scope: ListScope, out: &mut String) {
        self.list = ListView::new(self.ctx.clone(), scope);
        let outcome = self.list.mount().await;
        self.render_list(outcome, out);
    }

    fn render_list(&self, outcome: ListOutcome, out: &mut String) {
        match outcome {
            ListOutcome::Redirect(Route::Login) => { out.push_str("please log in first (login <email> <password>)"); return; }
            ListOutcome::Unchanged => { out.push_str("no more pages in that direction"); return; }
            _ => {}
        }
        let search = self.list.search_text();
        if !search.trim().is_empty() { let _ = writeln!(out, "search: \"{}\"", search.trim()); }
        match self.list.state() {
            ListState::Loaded { items, total_count } => {
                out.push_str(&render_article_table(&items, self.list.page(), self.list.total_pages(), total_count));
            }
            ListState::Empty { .. } => {
                out.push_str("no articles found");
                if let Some(hint) = self.list.empty_hint() { let _ = write!(out, "\n{}", hint); }
            }
            ListState::Error { message } => out.push_str(&render_notice(&Notice::error(message))),
            ListState::Loading => out.push_str("loading..."),
        }
    }

    async fn show(&self, id: &str, out: &mut String) {
        let view = DetailView::new(self.ctx.clone(), id);
        match view.load().await {
            DetailState::Loaded(article) => out.push_str(&render_article(&article, view.can_mutate())),
            DetailState::NotFound => out.push_str("Article not found (type 'home' to go back)"),
            DetailState::Error { message } => out.push_str(&render_notice(&Notice::error(message))),
            DetailState::Loading => {}
        }
    }

    async fn create(&self, prompt: &mut dyn Prompt, out: &mut String) {
        let view = CreateView::new(self.ctx.clone());
        let Some(title) = prompt.line("title: ") else { out.push_str("cancelled"); return; };
        let Some(content) = prompt.line("content: ") else { out.push_str("cancelled"); return; };
        view.set_title(&title);
        view.set_content(&content);
        self.finish_submit(view.submit().await, out);
    }

    async fn edit(&self, id: &str, prompt: &mut dyn Prompt, out: &mut String) {
        let view = EditView::new(self.ctx.clone(), id);
        match view.load().await {
            EditLoad::Ready => {}
            EditLoad::Redirect(_) => { out.push_str("please log in first (login <email> <password>)"); return; }
            EditLoad::Failed { message, .. } => { out.push_str(&render_notice(&Notice::error(message))); return; }
            EditLoad::Loading => return,
        }
        let current = view.form();
        let Some(title) = prompt.line(&format!("title [{}]: ", current.title)) else { out.push_str("cancelled"); return; };
        let Some(content) = prompt.line("content [enter keeps current]: ") else { out.push_str("cancelled"); return; };
        if !title.is_empty() { view.set_title(&title); }
        if !content.is_empty() { view.set_content(&content); }
        self.finish_submit(view.submit().await, out);
    }

    fn finish_submit(&self, outcome: SubmitOutcome, out: &mut String) {
        match outcome {
            SubmitOutcome::Saved { route, notice } => {
                if let Some(n) = notice { out.push_str(&render_notice(&n)); }
                if let Route::Article(id) = route { let _ = write!(out, "\n(show {})", id); }
            }
            SubmitOutcome::Rejected(e) => match e.field() {
                Some(field) => { let _ = write!(out, "{}: {}", field, e.message()); }
                None => out.push_str(&render_notice(&Notice::error(e.user_message()))),
            },
            SubmitOutcome::Busy => out.push_str("already saving"),
        }
    }

    async fn delete(&self, id: &str, prompt: &mut dyn Prompt, out: &mut String) {
        let view = DetailView::new(self.ctx.clone(), id);
        match view.load().await {
            DetailState::Loaded(_) if view.can_mutate() => {}
            DetailState::Loaded(_) => { out.push_str("you can only delete your own articles"); return; }
            DetailState::NotFound => { out.push_str("Article not found"); return; }
            DetailState::Error { message } => { out.push_str(&render_notice(&Notice::error(message))); return; }
            DetailState::Loading => return,
        }
        let confirm = PromptConfirm(RefCell::new(prompt));
        match view.delete(&confirm).await {
            DeleteOutcome::Cancelled => out.push_str("cancelled"),
            DeleteOutcome::Deleted { notice, .. } | DeleteOutcome::Failed { notice } => out.push_str(&render_notice(&notice)),
        }
    }
}

fn two_args(args: &str) -> Option<(&str, &str)> {
    let mut it = args.split_whitespace();
    let (a, b) = (it.next()?, it.next()?);
    it.next().is_none().then_some((a, b))
}

fn push_form_error(out: &mut String, message: Option<String>) {
    out.push_str(&render_notice(&Notice::error(message.unwrap_or_else(|| "request failed".to_string()))));
}

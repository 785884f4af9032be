//! Headless view-models for the blog pages.
//!
//! Each view owns its renderable state behind a lock, talks to the repository and
//! the session provider it was given, and reports navigation as a [`Route`] plus
//! optional [`Notice`] instead of touching any UI toolkit. Locks are never held
//! across an `.await`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::identity::{AuthProvider, Identity, SessionProvider};
use crate::repository::ArticleRepository;

pub mod list;
pub mod detail;
pub mod editor;
pub mod auth;

pub use list::{ListOutcome, ListScope, ListState, ListView};
pub use detail::{read_time_label, read_time_minutes, word_count, Confirm, DeleteOutcome, DetailState, DetailView};
pub use editor::{CreateView, EditLoad, EditView, FormState, SubmitOutcome};
pub use auth::{logout, AuthFormState, AuthOutcome, LoginView, LogoutOutcome, SignupView, LOGOUT_PROMPT};

/// Navigation targets, one per page of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Article(String),
    Create,
    Edit(String),
    MyArticles,
    Login,
    Signup,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Article(id) => format!("/blog/{}", id),
            Route::Create => "/create".to_string(),
            Route::Edit(id) => format!("/edit/{}", id),
            Route::MyArticles => "/my-blogs".to_string(),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.path()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Short-lived user-facing message produced by an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success<S: Into<String>>(text: S) -> Self { Self { level: NoticeLevel::Success, text: text.into() } }
    pub fn info<S: Into<String>>(text: S) -> Self { Self { level: NoticeLevel::Info, text: text.into() } }
    pub fn error<S: Into<String>>(text: S) -> Self { Self { level: NoticeLevel::Error, text: text.into() } }
}

/// Collaborators shared by every view.
#[derive(Clone)]
pub struct ViewContext {
    pub repo: ArticleRepository,
    pub session: Arc<SessionProvider>,
    pub auth: Arc<dyn AuthProvider>,
    pub page_size: u32,
    pub search_debounce: Duration,
}

impl ViewContext {
    pub fn new(repo: ArticleRepository, session: Arc<SessionProvider>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { repo, session, auth, page_size: DEFAULT_PAGE_SIZE, search_debounce: Duration::from_millis(300) }
    }

    pub fn with_config(mut self, cfg: &Config) -> Self {
        self.page_size = cfg.page_size.max(1);
        self.search_debounce = cfg.search_debounce;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self { self.page_size = page_size.max(1); self }

    pub fn with_debounce(mut self, debounce: Duration) -> Self { self.search_debounce = debounce; self }

    pub fn identity(&self) -> Option<Identity> { self.session.current() }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::identity::{AuthService, LocalAuthProvider};
    use crate::storage::MemoryStore;

    /// In-process backend with two registered users, nobody signed in.
    pub(crate) struct Fixture {
        pub ctx: ViewContext,
        pub auth: Arc<LocalAuthProvider>,
        pub store: MemoryStore,
    }

    impl Fixture {
        pub(crate) async fn new() -> Self {
            let store = MemoryStore::new();
            let auth = Arc::new(LocalAuthProvider::new(AuthService::default()));
            auth.sign_up("u1@example.com", "secret1").await.unwrap();
            auth.sign_up("u2@example.com", "secret2").await.unwrap();
            let session = SessionProvider::start(auth.clone()).await;
            let repo = ArticleRepository::new(Arc::new(store.clone()));
            let ctx = ViewContext::new(repo, session, auth.clone()).with_debounce(Duration::ZERO);
            Self { ctx, auth, store }
        }

        /// Sign in and wait until the session provider has seen it.
        pub(crate) async fn sign_in(&self, email: &str, password: &str) -> Identity {
            let mut rx = self.ctx.session.subscribe();
            let id = self.auth.sign_in_with_password(email, password).await.unwrap();
            while self.ctx.session.current().as_ref() != Some(&id) {
                rx.changed().await.unwrap();
            }
            id
        }

        pub(crate) async fn sign_out(&self) {
            let mut rx = self.ctx.session.subscribe();
            self.auth.sign_out().await.unwrap();
            while self.ctx.session.current().is_some() {
                rx.changed().await.unwrap();
            }
        }
    }

    #[test]
    fn route_paths() {
        assert_eq!(Route::Home.path(), "/");
        assert_eq!(Route::Article("a1".into()).to_string(), "/blog/a1");
        assert_eq!(Route::Edit("a1".into()).path(), "/edit/a1");
        assert_eq!(Route::MyArticles.path(), "/my-blogs");
    }
}

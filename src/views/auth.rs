//! Login, signup and logout flows.

use parking_lot::Mutex;
use tracing::{info, warn};

use super::{Confirm, Notice, Route, ViewContext};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthFormState {
    pub email: String,
    pub password: String,
    pub error: Option<AppError>,
    pub loading: bool,
}

pub const LOGOUT_PROMPT: &str = "Are you sure you want to log out?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Declined at the prompt; still signed in.
    Cancelled,
    SignedOut { route: Route, notice: Notice },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { route: Route, notice: Notice },
    /// Error is recorded inline on the form; some flows add a notice.
    Failed { notice: Option<Notice> },
    Busy,
}

struct LoadingGuard<'a>(&'a Mutex<AuthFormState>);

impl<'a> LoadingGuard<'a> {
    fn enter(form: &'a Mutex<AuthFormState>) -> Option<(Self, String, String)> {
        let mut f = form.lock();
        if f.loading { return None; }
        f.loading = true;
        f.error = None;
        let creds = (f.email.trim().to_string(), f.password.clone());
        drop(f);
        Some((LoadingGuard(form), creds.0, creds.1))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) { self.0.lock().loading = false; }
}

macro_rules! form_accessors {
    () => {
        pub fn form(&self) -> AuthFormState { self.form.lock().clone() }

        pub fn set_email(&self, email: &str) { self.form.lock().email = email.to_string(); }

        pub fn set_password(&self, password: &str) { self.form.lock().password = password.to_string(); }
    };
}

pub struct LoginView {
    ctx: ViewContext,
    form: Mutex<AuthFormState>,
}

impl LoginView {
    pub fn new(ctx: ViewContext) -> Self { Self { ctx, form: Mutex::new(AuthFormState::default()) } }

    form_accessors!();

    pub async fn submit(&self) -> AuthOutcome {
        let Some((_guard, email, password)) = LoadingGuard::enter(&self.form) else { return AuthOutcome::Busy; };
        match self.ctx.auth.sign_in_with_password(&email, &password).await {
            Ok(identity) => {
                info!(target: "bloggy::views", "signed in user={}", identity.id);
                self.form.lock().password.clear();
                AuthOutcome::Success { route: Route::Home, notice: Notice::success(format!("Welcome back, {}!", identity.email)) }
            }
            Err(e) => {
                warn!(target: "bloggy::views", "login failed for '{}': {}", email, e.code_str());
                let notice = Notice::error(format!("Login failed: {}", e.user_message()));
                self.form.lock().error = Some(e);
                AuthOutcome::Failed { notice: Some(notice) }
            }
        }
    }
}

pub struct SignupView {
    ctx: ViewContext,
    form: Mutex<AuthFormState>,
}

impl SignupView {
    pub fn new(ctx: ViewContext) -> Self { Self { ctx, form: Mutex::new(AuthFormState::default()) } }

    form_accessors!();

    pub async fn submit(&self) -> AuthOutcome {
        let Some((_guard, email, password)) = LoadingGuard::enter(&self.form) else { return AuthOutcome::Busy; };
        match self.ctx.auth.sign_up(&email, &password).await {
            Ok(identity) => {
                info!(target: "bloggy::views", "account created user={}", identity.id);
                *self.form.lock() = AuthFormState { email, ..Default::default() };
                AuthOutcome::Success { route: Route::Login, notice: Notice::success("Account created, please log in") }
            }
            Err(e) => {
                self.form.lock().error = Some(e);
                AuthOutcome::Failed { notice: None }
            }
        }
    }
}

/// Ask first, then end the session and send the user to the login page.
pub async fn logout(ctx: &ViewContext, confirm: &dyn Confirm) -> AppResult<LogoutOutcome> {
    if !confirm.confirm(LOGOUT_PROMPT) {
        return Ok(LogoutOutcome::Cancelled);
    }
    ctx.auth.sign_out().await?;
    info!(target: "bloggy::views", "signed out");
    Ok(LogoutOutcome::SignedOut { route: Route::Login, notice: Notice::success("Logged out successfully!") })
}

use std::path::Path;

use tracing::info;

use super::accounts::AccountStore;
use super::principal::Identity;
use super::session::{Session, SessionManager};
use crate::error::{AppError, AppResult};

/// Backend half of authentication: the account registry plus the session table.
/// Shared by the HTTP server and by in-process clients.
#[derive(Clone, Default)]
pub struct AuthService {
    pub accounts: AccountStore,
    pub sessions: SessionManager,
}

impl AuthService {
    pub fn new(accounts: AccountStore, sessions: SessionManager) -> Self { Self { accounts, sessions } }

    /// Accounts persisted under `dir/accounts.json`.
    pub fn open(dir: &Path, sessions: SessionManager) -> anyhow::Result<Self> {
        Ok(Self::new(AccountStore::open(dir.join("accounts.json"))?, sessions))
    }

    pub fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity> {
        self.accounts.sign_up(email, password)
    }

    pub fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let identity = self.accounts.verify(email, password)?;
        let session = self.sessions.issue(identity)?;
        info!(target: "bloggy::auth", "login user={} sid={}", session.identity.id, session.session_id);
        Ok(session)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.logout(token)
    }

    pub fn current_user(&self, token: &str) -> Option<Identity> {
        self.sessions.validate(token)
    }

    /// Identity for `token` or an `Auth` error when the session is absent or expired.
    pub fn require(&self, token: Option<&str>) -> AppResult<Identity> {
        token
            .and_then(|t| self.current_user(t))
            .ok_or_else(|| AppError::auth("no_session", "You must be logged in"))
    }
}

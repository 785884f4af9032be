use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::principal::Identity;
use super::service::AuthService;
use crate::error::AppResult;

/// Auth-state change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Client-side contract of the auth service. An implementation holds at most one
/// signed-in session and announces every change through `subscribe`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Identity>;
    async fn sign_out(&self) -> AppResult<()>;
    async fn get_current_user(&self) -> AppResult<Option<Identity>>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

pub(crate) const EVENT_CAPACITY: usize = 16;

/// In-process auth client talking directly to an [`AuthService`].
pub struct LocalAuthProvider {
    service: AuthService,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl LocalAuthProvider {
    pub fn new(service: AuthService) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { service, token: RwLock::new(None), events }
    }

    pub fn service(&self) -> &AuthService { &self.service }

    /// Bearer token of the current session, if signed in.
    pub fn token(&self) -> Option<String> { self.token.read().clone() }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity> {
        self.service.sign_up(email, password)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Identity> {
        let session = self.service.login(email, password)?;
        let previous = self.token.write().replace(session.token.clone());
        if let Some(old) = previous { self.service.logout(&old); }
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthEvent::SignedIn(session.identity.clone()));
        Ok(session.identity)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let previous = self.token.write().take();
        if let Some(tok) = previous {
            self.service.logout(&tok);
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        debug!(target: "bloggy::auth", "local sign_out");
        Ok(())
    }

    async fn get_current_user(&self) -> AppResult<Option<Identity>> {
        let tok = self.token.read().clone();
        Ok(tok.and_then(|t| self.service.current_user(&t)))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> { self.events.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_in_out_emits_events() {
        let auth = LocalAuthProvider::new(AuthService::default());
        let mut rx = auth.subscribe();
        let id = auth.sign_up("dave@example.com", "secret1").await.unwrap();
        assert_eq!(auth.get_current_user().await.unwrap(), None);

        auth.sign_in_with_password("dave@example.com", "secret1").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedIn(id.clone()));
        assert_eq!(auth.get_current_user().await.unwrap(), Some(id));

        auth.sign_out().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut);
        assert_eq!(auth.get_current_user().await.unwrap(), None);
        assert_eq!(auth.service().sessions.active_count(), 0);
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_signed_out() {
        let auth = LocalAuthProvider::new(AuthService::default());
        auth.sign_up("erin@example.com", "secret1").await.unwrap();
        let err = auth.sign_in_with_password("erin@example.com", "nope").await.unwrap_err();
        assert_eq!(err.http_status(), 401);
        assert!(auth.token().is_none());
    }
}

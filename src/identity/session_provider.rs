use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::principal::Identity;
use super::provider::{AuthEvent, AuthProvider};

/// Holds "current identity or none" for the views and keeps it in step with the
/// auth service. Only the provider writes the cell; everyone else reads or watches.
pub struct SessionProvider {
    cell: Arc<watch::Sender<Option<Identity>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionProvider {
    /// Provider with no identity and no auth service behind it.
    pub fn signed_out() -> Arc<Self> {
        let (tx, _) = watch::channel(None);
        Arc::new(Self { cell: Arc::new(tx), listener: Mutex::new(None) })
    }

    /// Fetch the current identity once, then follow auth-state notifications.
    /// A failed initial fetch is treated as signed out.
    pub async fn start(auth: Arc<dyn AuthProvider>) -> Arc<Self> {
        // Subscribe before fetching so a sign-in racing the fetch is not lost.
        let events = auth.subscribe();
        let initial = match auth.get_current_user().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(target: "bloggy::auth", "initial identity fetch failed: {e}");
                None
            }
        };
        let (tx, _) = watch::channel(initial);
        let cell = Arc::new(tx);
        let handle = tokio::spawn(follow_events(auth, events, cell.clone()));
        Arc::new(Self { cell, listener: Mutex::new(Some(handle)) })
    }

    pub fn current(&self) -> Option<Identity> { self.cell.borrow().clone() }

    pub fn is_signed_in(&self) -> bool { self.cell.borrow().is_some() }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> { self.cell.subscribe() }

    /// Wait until the cell says signed in (or out), giving up after `limit`.
    /// Returns whether that state was reached.
    pub async fn settle(&self, signed_in: bool, limit: Duration) -> bool {
        let mut rx = self.subscribe();
        let reached = tokio::time::timeout(limit, rx.wait_for(|cur| cur.is_some() == signed_in)).await;
        matches!(reached, Ok(Ok(_)))
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        if let Some(h) = self.listener.lock().take() { h.abort(); }
    }
}

async fn follow_events(
    auth: Arc<dyn AuthProvider>,
    mut events: broadcast::Receiver<AuthEvent>,
    cell: Arc<watch::Sender<Option<Identity>>>,
) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(identity)) => {
                debug!(target: "bloggy::auth", "session provider: signed in user={}", identity.id);
                cell.send_replace(Some(identity));
            }
            Ok(AuthEvent::SignedOut) => {
                debug!(target: "bloggy::auth", "session provider: signed out");
                cell.send_replace(None);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Missed notifications: resolve the truth directly.
                warn!(target: "bloggy::auth", "session provider lagged by {skipped} events; refetching");
                let identity = auth.get_current_user().await.unwrap_or(None);
                cell.send_replace(identity);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use crate::error::{AppError, AppResult};
use crate::tprintln;

use super::principal::Identity;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub csrf: String,
    pub identity: Identity,
    pub expires_at: Instant,
}

pub(crate) fn gen_token() -> AppResult<String> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("token", e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Issues and validates bearer tokens for signed-in identities.
/// Cloning shares the same session table. Expired sessions are swept on every
/// `issue` and dropped on sight in `get`.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionToken, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self { Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) } }

    pub fn issue(&self, identity: Identity) -> AppResult<Session> {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_token()?,
            token: gen_token()?,
            csrf: gen_token()?,
            identity,
            expires_at: now + self.ttl,
        };
        let swept = {
            let mut t = self.sessions.write();
            let before = t.len();
            t.retain(|_, s| s.expires_at > now);
            let swept = before - t.len();
            t.insert(sess.token.clone(), sess.clone());
            swept
        };
        tprintln!("session.issue user={} sid={} ttl_secs={} swept={}", sess.identity.id, sess.session_id, self.ttl.as_secs(), swept);
        Ok(sess)
    }

    /// Live session for `token`; expired sessions are dropped on sight.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        {
            let t = self.sessions.read();
            match t.get(token) {
                Some(s) if s.expires_at > now => return Some(s.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().remove(token);
        None
    }

    pub fn validate(&self, token: &str) -> Option<Identity> {
        self.get(token).map(|s| s.identity)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    pub fn active_count(&self) -> usize { self.sessions.read().len() }
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use password_hash::{PasswordHash, SaltString};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::principal::Identity;
use crate::error::{AppError, AppResult};
use crate::storage::snapshot;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    id: String,
    email: String,
    password_hash: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Registry of sign-up accounts with Argon2 password hashes. E-mail lookup is
/// case-insensitive.
///
/// A sign-up counts only once its snapshot is written; a failed write removes the
/// account again and reports the error.
#[derive(Clone)]
pub struct AccountStore {
    by_email: Arc<RwLock<HashMap<String, Account>>>,
    write_gate: Arc<Mutex<()>>,
    snapshot: Option<PathBuf>,
}

fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("salt", e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("salt", e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash", e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

fn invalid_credentials() -> AppError { AppError::auth("invalid_credentials", "Invalid login credentials") }

/// Shape checks shared by sign-up and the client-side signup form.
pub fn validate_credentials(email: &str, password: &str) -> AppResult<()> {
    if email.trim().is_empty() { return Err(AppError::validation("email", "Email is required")); }
    if !EMAIL_RE.is_match(email.trim()) { return Err(AppError::validation("email", "Email address is invalid")); }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("password", "Password should be at least 6 characters"));
    }
    Ok(())
}

impl Default for AccountStore {
    fn default() -> Self { Self::in_memory() }
}

impl AccountStore {
    pub fn in_memory() -> Self {
        Self { by_email: Arc::new(RwLock::new(HashMap::new())), write_gate: Arc::default(), snapshot: None }
    }

    /// Open a store backed by a snapshot file, loading any existing accounts.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let rows: Vec<Account> = snapshot::load_entries(&path)?;
        let map = rows.into_iter().map(|a| (a.email.clone(), a)).collect::<HashMap<_, _>>();
        info!(target: "bloggy::auth", "accounts loaded: {} from '{}'", map.len(), path.display());
        Ok(Self { by_email: Arc::new(RwLock::new(map)), write_gate: Arc::default(), snapshot: Some(path) })
    }

    pub fn sign_up(&self, email: &str, password: &str) -> AppResult<Identity> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);
        if self.by_email.read().contains_key(&key) {
            return Err(AppError::conflict("user_exists", "User already registered"));
        }
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email: key.clone(),
            password_hash: hash_password(password)?,
            created_at: chrono::Utc::now(),
        };
        let identity = Identity::new(account.id.clone(), account.email.clone());
        let _gate = self.write_gate.lock();
        {
            let mut map = self.by_email.write();
            // A concurrent sign-up may have won between the check and the hash.
            if map.contains_key(&key) {
                return Err(AppError::conflict("user_exists", "User already registered"));
            }
            map.insert(key.clone(), account);
        }
        if let Err(e) = self.persist() {
            self.by_email.write().remove(&key);
            return Err(e);
        }
        info!(target: "bloggy::auth", "signup user={}", identity.id);
        Ok(identity)
    }

    pub fn verify(&self, email: &str, password: &str) -> AppResult<Identity> {
        let key = normalize_email(email);
        let Some(acct) = self.by_email.read().get(&key).cloned() else { return Err(invalid_credentials()); };
        if !verify_password(&acct.password_hash, password) { return Err(invalid_credentials()); }
        Ok(Identity::new(acct.id, acct.email))
    }

    pub fn len(&self) -> usize { self.by_email.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn persist(&self) -> AppResult<()> {
        let Some(path) = &self.snapshot else { return Ok(()); };
        let rows: Vec<Account> = self.by_email.read().values().cloned().collect();
        snapshot::save_entries(path, &rows).map_err(|e| {
            warn!(target: "bloggy::auth", "account snapshot failed: {e:#}");
            AppError::internal("snapshot", e.to_string())
        })
    }
}

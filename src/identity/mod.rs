//! Identity, sessions and ownership checks.
//! Backend pieces (accounts, session table, auth service) and client pieces (auth
//! provider contract, session provider, ownership guard) live side by side here.

mod principal;
mod session;
mod accounts;
mod service;
mod provider;
mod session_provider;
mod request_context;
mod authorizer;

pub use principal::Identity;
pub use session::{Session, SessionToken, SessionManager};
pub use accounts::{AccountStore, validate_credentials, MIN_PASSWORD_LEN};
pub use service::AuthService;
pub use provider::{AuthEvent, AuthProvider, LocalAuthProvider};
pub(crate) use provider::EVENT_CAPACITY;
pub use session_provider::SessionProvider;
pub use request_context::RequestContext;
pub use authorizer::{can_mutate, is_owner};

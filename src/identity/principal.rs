use serde::{Deserialize, Serialize};

/// An authenticated user as reported by the auth service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl Identity {
    pub fn new<S: Into<String>>(id: S, email: S) -> Self { Self { id: id.into(), email: email.into() } }
}

use super::Identity;

/// Per-request view of the caller, resolved from the session cookie.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
}

impl RequestContext {
    pub fn requester_id(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.id.as_str()) }
}

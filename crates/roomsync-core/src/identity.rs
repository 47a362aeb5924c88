//! Session identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synchronous view of the authenticated session.
///
/// Session storage itself lives outside this crate; callers hand the current
/// snapshot in whenever it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Signed-in user. `None` while anonymous.
    pub user_id: Option<UserId>,
    /// Session has been authenticated by the backend.
    pub authenticated: bool,
    /// Bearer token for the event channel and REST calls.
    pub token: Option<String>,
}

impl Identity {
    /// Authenticated identity.
    pub fn authenticated(user_id: UserId, token: impl Into<String>) -> Self {
        Self { user_id: Some(user_id), authenticated: true, token: Some(token.into()) }
    }

    /// Anonymous identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated with a user identity present.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && self.user_id.is_some()
    }
}

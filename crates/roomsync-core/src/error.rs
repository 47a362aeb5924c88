//! Error types shared across the synchronization layers.

use thiserror::Error;

/// Failure of a request to an external collaborator (history page fetch,
/// membership check).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RequestError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Network failures and server-side (5xx) or throttling (429) statuses
    /// are transient. Client errors and undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::Decode(_) => false,
        }
    }
}

/// Errors encoding or decoding channel frames.
#[derive(Error, Debug)]
pub enum WireError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

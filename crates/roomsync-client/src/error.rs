//! Error types for the synchronization state machines.
//!
//! Access denials are not errors here: they are state transitions of the
//! [`crate::MembershipController`]. The errors below are either transient
//! (reported, state left consistent for retry) or validation failures
//! (rejected before anything reaches the network).

use roomsync_core::{RequestError, RoomKey};
use thiserror::Error;

/// Errors from the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connect attempted without an authenticated identity and token.
    #[error("cannot connect without an authenticated identity")]
    NotAuthenticated,

    /// The channel closed or failed to open while a connection was wanted.
    #[error("Disconnected: {0}")]
    Transport(String),
}

/// Errors loading message history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Page fetch failed. The pagination cursor was not advanced.
    #[error("failed to load page {page} of {room}: {source}")]
    Fetch {
        /// Room the page was requested for.
        room: RoomKey,
        /// Requested page.
        page: u32,
        /// Underlying request failure.
        #[source]
        source: RequestError,
    },
}

impl HistoryError {
    /// Returns true if retrying the same fetch may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => source.is_transient(),
        }
    }
}

/// Errors sending a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Content is empty or whitespace only.
    #[error("message is empty")]
    EmptyContent,

    /// No room is active.
    #[error("no active room")]
    NoActiveRoom,

    /// The active room has not been joined.
    #[error("room {room} is not joined")]
    NotJoined {
        /// Active room.
        room: RoomKey,
    },

    /// The channel failed to emit the message. Safe to retry.
    #[error("failed to send message to {room}: {reason}")]
    Emission {
        /// Target room.
        room: RoomKey,
        /// Channel failure description.
        reason: String,
    },
}

impl SendError {
    /// Returns true for local validation failures that never reached the
    /// network.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Emission { .. })
    }
}

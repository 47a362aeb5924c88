//! Outgoing message dispatch.
//!
//! Sends are validated locally and emitted fire-and-forget. No synthetic
//! message is inserted into the window: the authoritative copy arrives via
//! push or via the history refresh requested alongside the send.

use roomsync_core::RoomKey;

use crate::{action::ChannelCommand, error::SendError, membership::MembershipController};

/// Validates and dispatches outgoing messages for the active room.
#[derive(Debug, Clone, Default)]
pub struct SendCoordinator {
    last_failure: Option<SendError>,
}

impl SendCoordinator {
    /// Create a coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `content` and produce the channel command to emit.
    ///
    /// # Errors
    ///
    /// - `SendError::EmptyContent` if `content` is blank
    /// - `SendError::NotJoined` if the room has not been joined
    pub fn prepare(
        &mut self,
        membership: &MembershipController,
        content: &str,
    ) -> Result<ChannelCommand, SendError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SendError::EmptyContent);
        }
        if !membership.is_joined() {
            return Err(SendError::NotJoined { room: membership.room().clone() });
        }

        self.last_failure = None;
        Ok(ChannelCommand::Send { room: membership.room().clone(), content: content.to_string() })
    }

    /// Record a failed emission and return the error to surface.
    pub fn handle_emission_failure(&mut self, room: RoomKey, reason: impl Into<String>) -> SendError {
        let error = SendError::Emission { room, reason: reason.into() };
        tracing::warn!(error = %error, "message send failed");
        self.last_failure = Some(error.clone());
        error
    }

    /// Most recent emission failure, cleared by the next accepted send.
    pub fn last_failure(&self) -> Option<&SendError> {
        self.last_failure.as_ref()
    }
}

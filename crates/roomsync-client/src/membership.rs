//! Room access negotiation.
//!
//! One [`MembershipController`] exists per room activation. It decides when
//! the channel may subscribe to the room and owns the access state shown to
//! the user.
//!
//! # State Machine
//!
//! ```text
//!                     connected, not attempted
//! ┌───────────────┐   community               ┌────────┐
//! │ Uninitialized │──────────────────────────>│ Joined │
//! └───────────────┘                           └────────┘
//!         │ clan                                ↑    │ accessDenied
//!         ↓                        is member    │    ↓
//!   ┌──────────┐────────────────────────────────┘ ┌────────┐
//!   │ Checking │──────────────────────────────────>│ Denied │
//!   └──────────┘  not member / check failed       └────────┘
//! ```
//!
//! Join is attempted at most once per activation. Membership results are
//! applied only if their ticket matches the activation.

use roomsync_core::{DenialCode, Identity, RequestError, RoomKey, RoomKind, Ticket};

use crate::action::{ChannelCommand, MembershipCheck};

/// Outcome of access negotiation as seen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipDecision {
    /// Negotiation not finished.
    Pending,
    /// Room joined; sends are accepted.
    Joined,
    /// Access denied for this activation.
    Denied(DenialCode),
}

/// Internal access state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    /// Waiting for a connected channel.
    Uninitialized,
    /// Clan membership check in flight.
    Checking,
    /// Join emitted.
    Joined,
    /// Terminal for this activation.
    Denied(DenialCode),
}

/// Actions produced by the membership controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipAction {
    /// Emit a join or leave on the channel.
    Channel(ChannelCommand),
    /// Perform a clan membership check and report back with its ticket.
    CheckMembership(MembershipCheck),
}

/// Access negotiation for one room activation.
#[derive(Debug, Clone)]
pub struct MembershipController {
    ticket: Ticket,
    state: AccessState,
    /// Join was attempted for this activation. Never cleared except when the
    /// channel drops and the server forgets the subscription.
    join_attempted: bool,
}

impl MembershipController {
    /// Create a controller for a room activation.
    pub fn new(ticket: Ticket) -> Self {
        Self { ticket, state: AccessState::Uninitialized, join_attempted: false }
    }

    /// Activation this controller negotiates.
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Room this controller negotiates.
    pub fn room(&self) -> &RoomKey {
        &self.ticket.room
    }

    /// Internal state.
    pub fn state(&self) -> &AccessState {
        &self.state
    }

    /// User-facing decision.
    pub fn decision(&self) -> MembershipDecision {
        match &self.state {
            AccessState::Uninitialized | AccessState::Checking => MembershipDecision::Pending,
            AccessState::Joined => MembershipDecision::Joined,
            AccessState::Denied(code) => MembershipDecision::Denied(code.clone()),
        }
    }

    /// Room has been joined.
    pub fn is_joined(&self) -> bool {
        self.state == AccessState::Joined
    }

    /// Start negotiation if the channel is connected and no join has been
    /// attempted for this activation.
    pub fn advance(&mut self, connected: bool, identity: &Identity) -> Vec<MembershipAction> {
        if !connected || self.join_attempted || self.state != AccessState::Uninitialized {
            return vec![];
        }
        self.join_attempted = true;

        match self.ticket.room.kind {
            RoomKind::Community => self.join(),
            RoomKind::Clan => {
                let Some(user_id) = identity.user_id.clone().filter(|_| identity.is_authenticated())
                else {
                    self.deny(DenialCode::NotAuthenticated);
                    return vec![];
                };

                self.state = AccessState::Checking;
                tracing::debug!(room = %self.ticket.room, "checking clan membership");
                vec![MembershipAction::CheckMembership(MembershipCheck {
                    ticket: self.ticket.clone(),
                    user_id,
                    clan_id: self.ticket.room.id.clone(),
                })]
            },
        }
    }

    /// Apply a membership check response.
    ///
    /// Responses for another activation, or arriving when no check is
    /// pending, are discarded.
    pub fn handle_membership_result(
        &mut self,
        ticket: &Ticket,
        result: Result<bool, RequestError>,
    ) -> Vec<MembershipAction> {
        if *ticket != self.ticket || self.state != AccessState::Checking {
            tracing::debug!(%ticket, current = %self.ticket, "discarding stale membership result");
            return vec![];
        }

        match result {
            Ok(true) => self.join(),
            Ok(false) => {
                self.deny(DenialCode::NotMember);
                vec![]
            },
            Err(e) => {
                tracing::warn!(room = %self.ticket.room, error = %e, "membership check failed");
                self.deny(DenialCode::MembershipCheckFailed);
                vec![]
            },
        }
    }

    /// Apply a channel-level denial for rooms of `kind`.
    ///
    /// Only a joined room can be revoked. The leave is emitted right away so
    /// every join stays paired with exactly one leave.
    pub fn handle_access_denied(&mut self, kind: RoomKind, code: DenialCode) -> Vec<MembershipAction> {
        if kind != self.ticket.room.kind || self.state != AccessState::Joined {
            return vec![];
        }

        self.deny(code);
        vec![MembershipAction::Channel(ChannelCommand::Leave(self.ticket.room.clone()))]
    }

    /// The channel dropped. The server forgot the subscription, so a joined or
    /// checking room goes back to waiting for the next connection.
    pub fn handle_disconnected(&mut self) {
        if matches!(self.state, AccessState::Joined | AccessState::Checking) {
            self.state = AccessState::Uninitialized;
            self.join_attempted = false;
        }
    }

    /// End this activation. Returns the leave to emit if the room was joined.
    pub fn teardown(&mut self) -> Option<ChannelCommand> {
        let was_joined = self.is_joined();
        self.state = AccessState::Uninitialized;
        self.join_attempted = true;

        if was_joined {
            tracing::debug!(room = %self.ticket.room, "leaving room");
            Some(ChannelCommand::Leave(self.ticket.room.clone()))
        } else {
            None
        }
    }

    /// Tear down and start over for a new activation.
    pub fn reset(&mut self, ticket: Ticket) -> Option<ChannelCommand> {
        let leave = self.teardown();
        *self = Self::new(ticket);
        leave
    }

    fn join(&mut self) -> Vec<MembershipAction> {
        self.state = AccessState::Joined;
        tracing::info!(room = %self.ticket.room, "joining room");
        vec![MembershipAction::Channel(ChannelCommand::Join(self.ticket.room.clone()))]
    }

    fn deny(&mut self, code: DenialCode) {
        tracing::info!(room = %self.ticket.room, %code, "room access denied");
        self.state = AccessState::Denied(code);
    }
}

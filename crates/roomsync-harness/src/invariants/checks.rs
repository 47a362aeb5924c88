//! Concrete invariant implementations.

use std::collections::HashSet;

use roomsync_client::ChannelCommand;

use super::{ChannelEvent, Invariant, InvariantResult, SystemSnapshot, Violation};

/// The message window never holds two messages with the same id.
#[derive(Debug, Clone, Copy)]
pub struct NoDuplicateMessages;

impl Invariant for NoDuplicateMessages {
    fn name(&self) -> &'static str {
        "NoDuplicateMessages"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for message in &state.messages {
            if !seen.insert(message.id.as_str()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("message {} appears twice", message.id),
                });
            }
        }
        Ok(())
    }
}

/// The message window ascends by creation time.
#[derive(Debug, Clone, Copy)]
pub struct WindowOrdered;

impl Invariant for WindowOrdered {
    fn name(&self) -> &'static str {
        "WindowOrdered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for pair in state.messages.windows(2) {
            if pair[0].created_at > pair[1].created_at {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} ({}) is shown before older {} ({})",
                        pair[0].id, pair[0].created_at, pair[1].id, pair[1].created_at
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Every message in the window belongs to the active room.
#[derive(Debug, Clone, Copy)]
pub struct WindowMatchesActiveRoom;

impl Invariant for WindowMatchesActiveRoom {
    fn name(&self) -> &'static str {
        "WindowMatchesActiveRoom"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let stray = state.messages.iter().find(|m| state.active_room.as_deref() != Some(m.room.as_str()));
        match stray {
            Some(message) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "message {} of {} shown while active room is {:?}",
                    message.id, message.room, state.active_room
                ),
            }),
            None => Ok(()),
        }
    }
}

/// Membership and history of the active session serve the latest activation.
#[derive(Debug, Clone, Copy)]
pub struct SessionTicketsAgree;

impl Invariant for SessionTicketsAgree {
    fn name(&self) -> &'static str {
        "SessionTicketsAgree"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let tickets = [state.history_generation, state.membership_generation];
        match tickets.into_iter().flatten().find(|g| *g != state.generation) {
            Some(stale) => Err(Violation {
                invariant: self.name(),
                message: format!("session generation {stale}, latest activation {}", state.generation),
            }),
            None => Ok(()),
        }
    }
}

/// Joins and leaves pair up and at most one room is subscribed.
///
/// Replays the channel log: a join of a subscribed room, a leave of an
/// unsubscribed one, or two subscribed rooms are violations. A closed channel
/// drops all subscriptions. At the end the subscription must agree with the
/// membership decision of the active room.
#[derive(Debug, Clone, Copy)]
pub struct JoinLeaveSymmetry;

impl Invariant for JoinLeaveSymmetry {
    fn name(&self) -> &'static str {
        "JoinLeaveSymmetry"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let violation = |message: String| Err(Violation { invariant: self.name(), message });
        let mut subscribed: HashSet<String> = HashSet::new();

        for (index, event) in state.channel_log.iter().enumerate() {
            match event {
                ChannelEvent::Opened | ChannelEvent::Closed => subscribed.clear(),
                ChannelEvent::Command(ChannelCommand::Join(room)) => {
                    if !subscribed.insert(room.to_string()) {
                        return violation(format!("event {index}: {room} joined twice"));
                    }
                    if subscribed.len() > 1 {
                        return violation(format!("event {index}: {subscribed:?} subscribed at once"));
                    }
                },
                ChannelEvent::Command(ChannelCommand::Leave(room)) => {
                    if !subscribed.remove(&room.to_string()) {
                        return violation(format!("event {index}: {room} left without a join"));
                    }
                },
                ChannelEvent::Command(ChannelCommand::Send { .. }) => {},
            }
        }

        let expected: HashSet<String> = match (&state.active_room, state.joined) {
            (Some(room), true) => HashSet::from([room.clone()]),
            _ => HashSet::new(),
        };
        if subscribed == expected {
            Ok(())
        } else {
            violation(format!("channel subscribed to {subscribed:?}, membership expects {expected:?}"))
        }
    }
}

/// Messages are only sent to the room the channel has joined.
#[derive(Debug, Clone, Copy)]
pub struct SendRequiresJoin;

impl Invariant for SendRequiresJoin {
    fn name(&self) -> &'static str {
        "SendRequiresJoin"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut subscribed: HashSet<String> = HashSet::new();

        for (index, event) in state.channel_log.iter().enumerate() {
            match event {
                ChannelEvent::Opened | ChannelEvent::Closed => subscribed.clear(),
                ChannelEvent::Command(ChannelCommand::Join(room)) => {
                    subscribed.insert(room.to_string());
                },
                ChannelEvent::Command(ChannelCommand::Leave(room)) => {
                    subscribed.remove(&room.to_string());
                },
                ChannelEvent::Command(ChannelCommand::Send { room, .. }) => {
                    if !subscribed.contains(&room.to_string()) {
                        return Err(Violation {
                            invariant: self.name(),
                            message: format!("event {index}: sent to {room} without a join"),
                        });
                    }
                },
            }
        }
        Ok(())
    }
}

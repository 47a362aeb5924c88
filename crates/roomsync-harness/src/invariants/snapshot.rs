//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::{ops::Add, time::Duration};

use roomsync_app::App;
use roomsync_client::ChannelCommand;
use serde::Serialize;

/// Something that happened on the event channel, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel opened.
    Opened,
    /// The channel closed, dropping all subscriptions.
    Closed,
    /// A command was emitted.
    Command(ChannelCommand),
}

/// Snapshot of the client's observable state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    /// Active room as `kind:id`. `None` if no room is open.
    pub active_room: Option<String>,
    /// Generation of the most recent activation.
    pub generation: u64,
    /// Generation carried by the history ticket.
    pub history_generation: Option<u64>,
    /// Generation carried by the membership ticket.
    pub membership_generation: Option<u64>,
    /// Membership decision is joined.
    pub joined: bool,
    /// Message window in display order.
    pub messages: Vec<MessageSnapshot>,
    /// Channel events since the start of the simulation.
    #[serde(skip)]
    pub channel_log: Vec<ChannelEvent>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no room).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the state of `app` together with the channel history.
    pub fn capture<I>(app: &App<I>, channel_log: &[ChannelEvent]) -> Self
    where
        I: Copy + Ord + Add<Duration, Output = I>,
    {
        let session = app.session();
        Self {
            active_room: app.active_room().map(ToString::to_string),
            generation: app.generation(),
            history_generation: session.map(|s| s.history().ticket().generation),
            membership_generation: session.map(|s| s.membership().ticket().generation),
            joined: session.is_some_and(|s| s.membership().is_joined()),
            messages: session
                .map(|s| {
                    s.messages()
                        .iter()
                        .map(|m| MessageSnapshot {
                            id: m.id.as_str().to_string(),
                            room: m.room_key().to_string(),
                            created_at: m.created_at.timestamp(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            channel_log: channel_log.to_vec(),
        }
    }

    /// Ids of the window, in order.
    pub fn message_ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Snapshot of one message in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    /// Message id.
    pub id: String,
    /// Room as `kind:id`.
    pub room: String,
    /// Creation time, seconds since the epoch.
    pub created_at: i64,
}

impl MessageSnapshot {
    /// Create a message snapshot.
    pub fn new(id: impl Into<String>, room: impl Into<String>, created_at: i64) -> Self {
        Self { id: id.into(), room: room.into(), created_at }
    }
}

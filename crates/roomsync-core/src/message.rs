//! Persisted chat messages and REST pages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RoomId, RoomKey, RoomKind, UserId};

/// Server-assigned message identifier. Uniqueness key for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Kind of the room the message belongs to.
    pub room_kind: RoomKind,
    /// Author's user ID.
    pub author_id: UserId,
    /// Message text.
    pub content: String,
    /// Server timestamp. Ordering key (ascending, oldest first).
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Room identity of this message.
    pub fn room_key(&self) -> RoomKey {
        RoomKey { kind: self.room_kind, id: self.room_id.clone() }
    }

    /// Whether the message was posted in `room`.
    pub fn belongs_to(&self, room: &RoomKey) -> bool {
        self.room_kind == room.kind && self.room_id == room.id
    }
}

/// Pagination metadata of a message page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Older pages exist beyond this one.
    pub has_more: bool,
}

/// One page of persisted messages, as returned by the history endpoint.
///
/// Page 1 holds the most recent messages; higher pages go back in time. The
/// order of `messages` within a page is not relied upon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    /// Messages in this page.
    pub messages: Vec<Message>,
    /// Pagination metadata.
    pub pagination: Pagination,
}

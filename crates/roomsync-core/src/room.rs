//! Room identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of chat room.
///
/// Clan rooms are the more restrictive kind: joining one requires a
/// membership check before the channel subscribes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Open community chat.
    Community,
    /// Members-only clan chat.
    Clan,
}

impl RoomKind {
    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Clan => "clan",
        }
    }

    /// Whether joining requires an asynchronous membership check.
    pub fn requires_membership_check(self) -> bool {
        matches!(self, Self::Clan)
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned room identifier, unique within a [`RoomKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a room: `(kind, id)`.
///
/// Two rooms sharing an id but differing in kind are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomKey {
    /// Room kind.
    pub kind: RoomKind,
    /// Room identifier within the kind.
    pub id: RoomId,
}

impl RoomKey {
    /// Build a key from its parts.
    pub fn new(kind: RoomKind, id: impl Into<String>) -> Self {
        Self { kind, id: RoomId::new(id) }
    }

    /// Community room key.
    pub fn community(id: impl Into<String>) -> Self {
        Self::new(RoomKind::Community, id)
    }

    /// Clan room key.
    pub fn clan(id: impl Into<String>) -> Self {
        Self::new(RoomKind::Clan, id)
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl std::str::FromStr for RoomKey {
    type Err = String;

    /// Parse `kind:id`, e.g. `clan:42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| format!("expected kind:id, got {s:?}"))?;
        let kind = match kind {
            "community" => RoomKind::Community,
            "clan" => RoomKind::Clan,
            other => return Err(format!("unknown room kind {other:?}")),
        };
        if id.is_empty() {
            return Err("room id is empty".to_string());
        }
        Ok(Self::new(kind, id))
    }
}

/// A captured room activation.
///
/// Issued with every asynchronous request (membership check, page fetch).
/// When the response arrives it is applied only if its ticket still equals
/// the current activation; otherwise the room was switched (or re-entered)
/// while the request was in flight and the response is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    /// Room the request was issued for.
    pub room: RoomKey,
    /// Activation counter, bumped on every room activation.
    pub generation: u64,
}

impl Ticket {
    /// Create a ticket for an activation.
    pub fn new(room: RoomKey, generation: u64) -> Self {
        Self { room, generation }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.room, self.generation)
    }
}

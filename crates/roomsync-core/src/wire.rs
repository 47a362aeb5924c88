//! Event channel wire format.
//!
//! Frames are JSON text messages tagged by a `type` field:
//!
//! ```text
//! → {"type":"join","roomKind":"clan","roomId":"42"}
//! → {"type":"send","roomKind":"clan","roomId":"42","content":"gg"}
//! ← {"type":"message","message":{...}}
//! ← {"type":"accessDenied","roomKind":"clan","code":"CLAN_BANNED","message":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::{DenialCode, Message, RoomId, RoomKey, RoomKind, WireError};

/// Frame sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    /// Subscribe to a room's push events.
    Join {
        /// Room kind.
        room_kind: RoomKind,
        /// Room ID.
        room_id: RoomId,
    },
    /// Unsubscribe from a room.
    Leave {
        /// Room kind.
        room_kind: RoomKind,
        /// Room ID.
        room_id: RoomId,
    },
    /// Post a message.
    Send {
        /// Room kind.
        room_kind: RoomKind,
        /// Room ID.
        room_id: RoomId,
        /// Message text.
        content: String,
    },
}

impl ClientFrame {
    /// Join frame for `room`.
    pub fn join(room: &RoomKey) -> Self {
        Self::Join { room_kind: room.kind, room_id: room.id.clone() }
    }

    /// Leave frame for `room`.
    pub fn leave(room: &RoomKey) -> Self {
        Self::Leave { room_kind: room.kind, room_id: room.id.clone() }
    }

    /// Send frame for `room`.
    pub fn send(room: &RoomKey, content: impl Into<String>) -> Self {
        Self::Send { room_kind: room.kind, room_id: room.id.clone(), content: content.into() }
    }
}

/// Frame pushed from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// New message in a subscribed room.
    Message {
        /// The message.
        message: Message,
    },
    /// Access to a room of this kind was denied or revoked.
    AccessDenied {
        /// Kind of the room the denial applies to.
        room_kind: RoomKind,
        /// Denial reason.
        code: DenialCode,
        /// Human-readable detail.
        #[serde(default)]
        message: String,
    },
}

/// Membership check response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    /// User belongs to the clan.
    pub is_member: bool,
}

/// Encode a client frame as JSON text.
pub fn encode(frame: &ClientFrame) -> Result<String, WireError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a server frame from JSON text.
pub fn decode(text: &str) -> Result<ServerFrame, WireError> {
    Ok(serde_json::from_str(text)?)
}

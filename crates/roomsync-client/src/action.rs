//! Requests produced by the state machines for the caller to execute.

use roomsync_core::{RoomId, RoomKey, Ticket, UserId, wire::ClientFrame};

/// Outbound event channel command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    /// Subscribe to the room's push events.
    Join(RoomKey),
    /// Unsubscribe from the room.
    Leave(RoomKey),
    /// Post a message. Fire-and-forget.
    Send {
        /// Target room.
        room: RoomKey,
        /// Trimmed message text.
        content: String,
    },
}

impl ChannelCommand {
    /// Room this command targets.
    pub fn room(&self) -> &RoomKey {
        match self {
            Self::Join(room) | Self::Leave(room) | Self::Send { room, .. } => room,
        }
    }

    /// Wire frame for this command.
    pub fn to_frame(&self) -> ClientFrame {
        match self {
            Self::Join(room) => ClientFrame::join(room),
            Self::Leave(room) => ClientFrame::leave(room),
            Self::Send { room, content } => ClientFrame::send(room, content.as_str()),
        }
    }
}

/// Why a history page is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// First page of a room activation.
    Initial,
    /// Older page, prepended on arrival.
    Older,
    /// Re-fetch of the newest page after a send.
    Refresh,
}

/// Request for one page of persisted messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Activation the request belongs to.
    pub ticket: Ticket,
    /// 1-based page number. Page 1 is the newest.
    pub page: u32,
    /// What the response will be used for.
    pub purpose: FetchPurpose,
}

impl FetchRequest {
    /// Room to fetch from.
    pub fn room(&self) -> &RoomKey {
        &self.ticket.room
    }
}

/// Request to check clan membership before joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipCheck {
    /// Activation the check belongs to.
    pub ticket: Ticket,
    /// User to check.
    pub user_id: UserId,
    /// Clan to check against.
    pub clan_id: RoomId,
}

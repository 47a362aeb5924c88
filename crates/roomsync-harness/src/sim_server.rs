//! Scripted in-memory chat server.
//!
//! Stores messages per room, answers page and membership requests the way the
//! REST API does, and tracks channel subscriptions to decide which pushed
//! messages reach the client.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use roomsync_core::{
    DenialCode, Message, MessageId, MessagePage, Pagination, RoomId, RoomKey, UserId,
    wire::{ClientFrame, ServerFrame},
};

/// Messages per history page.
pub const PAGE_SIZE: usize = 20;

/// First message timestamp (seconds since the epoch).
const EPOCH_SECS: i64 = 1_700_000_000;

/// In-memory server state.
#[derive(Debug, Clone, Default)]
pub struct SimServer {
    /// Messages per room, ascending by `created_at`.
    rooms: HashMap<RoomKey, Vec<Message>>,
    /// Clan memberships.
    members: HashSet<(RoomId, UserId)>,
    /// Rooms subscribed on the current channel.
    subscriptions: HashSet<RoomKey>,
    /// Sequence used for ids and timestamps.
    next_seq: u64,
}

impl SimServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `count` messages from `author` in `room`, oldest first.
    pub fn seed(&mut self, room: &RoomKey, author: &UserId, count: usize) -> Vec<Message> {
        (0..count).map(|i| self.store(room, author, format!("seed {i}"))).collect()
    }

    /// Make `user` a member of `clan`.
    pub fn add_member(&mut self, clan: &RoomId, user: &UserId) {
        self.members.insert((clan.clone(), user.clone()));
    }

    /// Remove `user` from `clan`.
    pub fn remove_member(&mut self, clan: &RoomId, user: &UserId) {
        self.members.remove(&(clan.clone(), user.clone()));
    }

    /// Whether `user` belongs to `clan`.
    pub fn is_member(&self, clan: &RoomId, user: &UserId) -> bool {
        self.members.contains(&(clan.clone(), user.clone()))
    }

    /// Page `page` (1-based) of `room`: page 1 holds the newest messages.
    /// Messages within a page are listed newest first.
    pub fn page(&self, room: &RoomKey, page: u32) -> MessagePage {
        let all = self.rooms.get(room).map(Vec::as_slice).unwrap_or_default();
        let skip = (page.saturating_sub(1) as usize) * PAGE_SIZE;
        let end = all.len().saturating_sub(skip);
        let start = end.saturating_sub(PAGE_SIZE);

        MessagePage {
            messages: all[start..end].iter().rev().cloned().collect(),
            pagination: Pagination { has_more: start > 0 },
        }
    }

    /// All messages of `room`, ascending.
    pub fn messages(&self, room: &RoomKey) -> &[Message] {
        self.rooms.get(room).map(Vec::as_slice).unwrap_or_default()
    }

    /// Rooms subscribed on the current channel.
    pub fn subscriptions(&self) -> &HashSet<RoomKey> {
        &self.subscriptions
    }

    /// Apply a frame sent by `sender`. Returns the frames pushed back to the
    /// client.
    pub fn handle_frame(&mut self, frame: &ClientFrame, sender: &UserId) -> Vec<ServerFrame> {
        match frame {
            ClientFrame::Join { room_kind, room_id } => {
                self.subscriptions.insert(RoomKey::new(*room_kind, room_id.as_str()));
                vec![]
            },
            ClientFrame::Leave { room_kind, room_id } => {
                self.subscriptions.remove(&RoomKey::new(*room_kind, room_id.as_str()));
                vec![]
            },
            ClientFrame::Send { room_kind, room_id, content } => {
                let room = RoomKey::new(*room_kind, room_id.as_str());
                self.publish(&room, sender, content.clone()).into_iter().collect()
            },
        }
    }

    /// Store a message posted by anyone. Returns the push for the client if
    /// it is subscribed to `room`.
    pub fn publish(&mut self, room: &RoomKey, author: &UserId, content: String) -> Option<ServerFrame> {
        let message = self.store(room, author, content);
        self.subscriptions.contains(room).then(|| ServerFrame::Message { message })
    }

    /// Revoke the client's access to `room`. Returns the denial frame if the
    /// client is subscribed.
    pub fn revoke(&mut self, room: &RoomKey, code: DenialCode) -> Option<ServerFrame> {
        if !self.subscriptions.remove(room) {
            return None;
        }
        Some(ServerFrame::AccessDenied {
            room_kind: room.kind,
            code,
            message: String::new(),
        })
    }

    /// The channel dropped.
    pub fn disconnect(&mut self) {
        self.subscriptions.clear();
    }

    fn store(&mut self, room: &RoomKey, author: &UserId, content: String) -> Message {
        self.next_seq += 1;
        let message = Message {
            id: MessageId::new(format!("m{}", self.next_seq)),
            room_id: room.id.clone(),
            room_kind: room.kind,
            author_id: author.clone(),
            content,
            created_at: timestamp(self.next_seq),
        };
        self.rooms.entry(room.clone()).or_default().push(message.clone());
        message
    }
}

fn timestamp(seq: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(EPOCH_SECS + seq as i64, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_newest_first() {
        let mut server = SimServer::new();
        let room = RoomKey::community("c");
        let seeded = server.seed(&room, &UserId::new("a"), 45);

        let first = server.page(&room, 1);
        assert_eq!(first.messages.len(), PAGE_SIZE);
        assert_eq!(first.messages[0].id, seeded[44].id);
        assert!(first.pagination.has_more);

        let third = server.page(&room, 3);
        assert_eq!(third.messages.len(), 5);
        assert_eq!(third.messages[4].id, seeded[0].id);
        assert!(!third.pagination.has_more);

        assert!(server.page(&room, 4).messages.is_empty());
    }

    #[test]
    fn exact_multiple_has_no_more() {
        let mut server = SimServer::new();
        let room = RoomKey::community("c");
        server.seed(&room, &UserId::new("a"), 40);
        assert!(!server.page(&room, 2).pagination.has_more);
    }

    #[test]
    fn pushes_only_reach_subscribed_rooms() {
        let mut server = SimServer::new();
        let room = RoomKey::clan("k");
        let user = UserId::new("a");

        assert!(server.publish(&room, &user, "before".into()).is_none());
        server.handle_frame(&ClientFrame::join(&room), &user);
        assert!(server.publish(&room, &user, "after".into()).is_some());
        server.handle_frame(&ClientFrame::leave(&room), &user);
        assert!(server.publish(&room, &user, "gone".into()).is_none());
        assert_eq!(server.messages(&room).len(), 3);
    }

    #[test]
    fn revoke_requires_subscription() {
        let mut server = SimServer::new();
        let room = RoomKey::clan("k");
        assert!(server.revoke(&room, DenialCode::ClanBanned).is_none());

        server.handle_frame(&ClientFrame::join(&room), &UserId::new("a"));
        assert!(matches!(
            server.revoke(&room, DenialCode::ClanBanned),
            Some(ServerFrame::AccessDenied { code: DenialCode::ClanBanned, .. })
        ));
        assert!(server.subscriptions().is_empty());
    }
}

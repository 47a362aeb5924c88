//! Random operations for model-based and fuzz testing.
//!
//! Operations are decoded from raw bytes with `arbitrary`, so proptest and
//! libFuzzer can drive the same [`crate::Simulation`].

use arbitrary::Arbitrary;
use roomsync_core::{DenialCode, RoomKey, UserId};

/// Rooms the operations pick from: two open communities, a clan the
/// simulated user belongs to, and one they do not.
pub const ROOMS: [(&str, bool); 4] = [
    ("community:lobby", true),
    ("community:trade", true),
    ("clan:guild", true),
    ("clan:rival", false),
];

/// User the simulation runs as.
pub const SIM_USER: &str = "sim-user";

/// Someone else posting in rooms.
pub const OTHER_USER: &str = "other-user";

/// Index into [`ROOMS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct RoomChoice(u8);

impl RoomChoice {
    /// Room for this choice.
    pub fn room(self) -> RoomKey {
        let (key, _) = ROOMS[usize::from(self.0) % ROOMS.len()];
        key.parse().unwrap_or_else(|_| RoomKey::community("lobby"))
    }
}

/// One step of a simulated session.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Navigate to a room.
    OpenRoom(RoomChoice),
    /// Navigate away.
    CloseRoom,
    /// Send a short message to the active room.
    Send(u8),
    /// Another user posts to a room.
    Publish(RoomChoice),
    /// Scroll the message list to the top.
    ScrollToTop,
    /// Scroll the message list to the bottom.
    ScrollToBottom,
    /// Deliver held REST responses in a seeded order.
    Release(u64),
    /// The channel drops.
    DropChannel,
    /// Connect again.
    Reconnect,
    /// The server bans the user from a room.
    Revoke(RoomChoice),
    /// Retry a failed history load.
    RetryHistory,
    /// Let one second pass.
    Tick,
}

impl Operation {
    /// Content of a [`Operation::Send`]. Zero yields a blank message.
    pub fn content(n: u8) -> String {
        if n == 0 { "   ".to_string() } else { format!("hello {n}") }
    }

    /// Denial used by [`Operation::Revoke`].
    pub fn revoke_code(room: &RoomKey) -> DenialCode {
        if room.kind.requires_membership_check() {
            DenialCode::ClanBanned
        } else {
            DenialCode::CommunityBanned
        }
    }
}

/// User ids of the simulation.
pub fn sim_user() -> UserId {
    UserId::new(SIM_USER)
}

/// The other poster.
pub fn other_user() -> UserId {
    UserId::new(OTHER_USER)
}

#[cfg(test)]
mod tests {
    use arbitrary::Unstructured;

    use super::*;

    #[test]
    fn choices_cover_all_rooms() {
        let rooms: Vec<_> = (0..4).map(|i| RoomChoice(i).room().to_string()).collect();
        assert_eq!(rooms, ROOMS.map(|(key, _)| key.to_string()));
        assert_eq!(RoomChoice(4).room(), RoomChoice(0).room());
    }

    #[test]
    fn empty_input_decodes_to_no_operations() {
        let mut u = Unstructured::new(&[]);
        let ops: Vec<Operation> = Vec::arbitrary(&mut u).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn blank_send_content() {
        assert!(Operation::content(0).trim().is_empty());
        assert_eq!(Operation::content(3), "hello 3");
    }
}

//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from three sources:
//! - User intents (open a room, send, scroll) and system ticks.
//! - The event channel (open/close notifications, pushed frames).
//! - Completed asynchronous requests, carrying the ticket they were issued
//!   with.

use roomsync_client::{FetchRequest, ScrollMetrics};
use roomsync_core::{Identity, MessagePage, RequestError, RoomKey, Ticket, wire::ServerFrame};

/// Events processed by the App state machine.
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual time) environments.
#[derive(Debug, Clone)]
pub enum AppEvent<I = std::time::Instant> {
    /// Periodic tick.
    Tick {
        /// Current time.
        now: I,
    },

    /// Connect with the current identity.
    Connect,

    /// Disconnect the channel.
    Disconnect,

    /// The session identity changed (sign in, sign out, token refresh).
    IdentityChanged(Identity),

    /// Navigate to a room.
    OpenRoom(RoomKey),

    /// Navigate away from the active room.
    CloseRoom,

    /// Send a message to the active room.
    Send {
        /// Message text.
        content: String,
    },

    /// Retry a failed initial history load.
    RetryHistory,

    /// Quit the application.
    Quit,

    /// The event channel is open.
    ChannelOpened,

    /// The event channel closed or failed to open.
    ChannelClosed {
        /// Close reason.
        reason: String,
        /// Time of the close, for reconnect scheduling.
        now: I,
    },

    /// Frame pushed by the server.
    Frame(ServerFrame),

    /// Membership check completed.
    MembershipChecked {
        /// Ticket the check was issued with.
        ticket: Ticket,
        /// Whether the user is a member.
        result: Result<bool, RequestError>,
    },

    /// History page fetch completed.
    PageLoaded {
        /// The original request.
        request: FetchRequest,
        /// Fetched page.
        result: Result<MessagePage, RequestError>,
    },

    /// The channel failed to emit a message.
    SendFailed {
        /// Target room.
        room: RoomKey,
        /// Failure description.
        reason: String,
    },

    /// The user scrolled the message list.
    Scrolled(ScrollMetrics),

    /// The view finished rendering with these metrics.
    Rendered(ScrollMetrics),
}

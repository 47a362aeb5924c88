//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use roomsync_client::{ChannelCommand, FetchRequest, MembershipCheck, ScrollBehavior};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Render the view.
    Render,

    /// Quit the application.
    Quit,

    /// Open the event channel.
    OpenChannel {
        /// Session token.
        token: String,
    },

    /// Close the event channel.
    CloseChannel,

    /// Emit a command on the event channel.
    Channel(ChannelCommand),

    /// Fetch a history page and report back with [`crate::AppEvent::PageLoaded`].
    FetchPage(FetchRequest),

    /// Check clan membership and report back with
    /// [`crate::AppEvent::MembershipChecked`].
    CheckMembership(MembershipCheck),

    /// Move the message list viewport.
    ScrollTo {
        /// Target `scroll_top`.
        top: f64,
        /// Animation.
        behavior: ScrollBehavior,
    },

    /// Surface a recoverable error or notice to the user.
    Notify {
        /// Text to show.
        message: String,
    },
}

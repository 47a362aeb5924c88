//! Client
//!
//! Sans-IO state machines for the room synchronization layer. Every component
//! consumes inputs (events, responses, viewport measurements) and returns
//! actions for the caller to execute; none of them perform I/O.
//!
//! # Components
//!
//! - [`ConnectionManager`]: event channel lifecycle and reconnection policy
//! - [`MembershipController`]: room access negotiation and join/leave emission
//! - [`MessageHistory`]: ordered, deduplicated message window with pagination
//! - [`ScrollAnchor`]: viewport anchoring, auto-scroll and pagination trigger
//! - [`SendCoordinator`]: outgoing message validation and dispatch
//!
//! Asynchronous requests are stamped with a [`roomsync_core::Ticket`]; their
//! responses are applied only while that ticket is still current.
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::HttpApi`]: REST history pages and membership checks
//! - [`transport::connect`]: WebSocket event channel

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod connection;
mod error;
mod history;
mod membership;
mod scroll;
mod send;

#[cfg(feature = "transport")]
pub mod transport;

pub use action::{ChannelCommand, FetchPurpose, FetchRequest, MembershipCheck};
pub use connection::{ConnectionAction, ConnectionManager, ConnectionState, ReconnectPolicy};
pub use error::{ConnectionError, HistoryError, SendError};
pub use history::{MessageHistory, PageOutcome, PushOutcome};
pub use membership::{AccessState, MembershipAction, MembershipController, MembershipDecision};
pub use scroll::{
    DEFAULT_BOTTOM_THRESHOLD, ScrollAnchor, ScrollBehavior, ScrollCommand, ScrollMetrics,
    ScrollSnapshot,
};
pub use send::SendCoordinator;

//! Core types for room synchronization.
//!
//! Identity of rooms and messages, access denial codes, the synchronous
//! session identity, and the JSON wire format spoken with the chat backend.
//! Everything here is plain data: the state machines that act on it live in
//! `roomsync-client`.
//!
//! # Components
//!
//! - [`RoomKey`]: `(kind, id)` identity of a community or clan room
//! - [`Ticket`]: captured room activation used to discard stale responses
//! - [`Message`] / [`MessagePage`]: persisted chat messages and REST pages
//! - [`DenialCode`]: closed set of access denial reasons
//! - [`wire`]: channel frames exchanged over the event channel

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod denial;
mod error;
mod identity;
mod message;
mod room;
pub mod wire;

pub use denial::{DenialCategory, DenialCode};
pub use error::{RequestError, WireError};
pub use identity::{Identity, UserId};
pub use message::{Message, MessageId, MessagePage, Pagination};
pub use room::{RoomId, RoomKey, RoomKind, Ticket};

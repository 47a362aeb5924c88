//! Application layer for room synchronization.
//!
//! Pure state machines and a generic runtime that wire the client state
//! machines together, enabling deterministic simulation testing with the same
//! code that runs in production.
//!
//! # Components
//!
//! - [`App`]: top-level state machine (connection, identity, active room)
//! - [`RoomSession`]: state of one room activation (membership, history,
//!   scroll anchor, send)
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod config;
mod driver;
mod event;
mod runtime;
mod session;

pub use action::AppAction;
pub use app::App;
pub use config::SyncConfig;
pub use driver::Driver;
pub use event::AppEvent;
pub use runtime::Runtime;
pub use session::RoomSession;

//! Command line client for roomsync.
//!
//! A thin shell over [`roomsync_app::Driver`] that reads commands from stdin
//! and prints the room transcript to stdout. All orchestration lives in the
//! generic [`roomsync_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod console;
pub mod input;

pub use console::{ConsoleDriver, RuntimeError};
pub use roomsync_app::{App, AppEvent, Runtime, SyncConfig};

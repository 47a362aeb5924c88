//! Deterministic simulation harness for room synchronization testing.
//!
//! A scripted in-memory server and a [`Driver`](roomsync_app::Driver)
//! implementation with virtual time and a simulated viewport, so the
//! production [`Runtime`](roomsync_app::Runtime) can be exercised
//! deterministically.
//!
//! # Model-Based Testing
//!
//! The [`Operation`] enum decodes random byte strings into user and network
//! actions. Property tests and fuzz targets apply them to a [`Simulation`].
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod operation;
pub mod sim_driver;
pub mod sim_server;
pub mod simulation;

pub use invariants::{
    ChannelEvent, Invariant, InvariantRegistry, InvariantResult, JoinLeaveSymmetry,
    MessageSnapshot, NoDuplicateMessages, SendRequiresJoin, SessionTicketsAgree, SystemSnapshot,
    Violation, WindowMatchesActiveRoom, WindowOrdered,
};
pub use operation::{Operation, RoomChoice};
pub use sim_driver::{Delivery, SimDriver, SimDriverError, SimViewport};
pub use sim_server::{PAGE_SIZE, SimServer};
pub use simulation::Simulation;

//! Properties of the client that hold after every processed event.
//!
//! A [`SystemSnapshot`] flattens what the user can observe (the active room,
//! the message window, the channel log) and each [`Invariant`] inspects it.
//! The simulation checks the [`InvariantRegistry::standard`] set after every
//! dispatch, step and render, so any event order the fuzzer finds is covered.

mod checks;
mod snapshot;

pub use checks::{
    JoinLeaveSymmetry, NoDuplicateMessages, SendRequiresJoin, SessionTicketsAgree,
    WindowMatchesActiveRoom, WindowOrdered,
};
pub use snapshot::{ChannelEvent, MessageSnapshot, SystemSnapshot};

/// Outcome of one invariant.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and the offending state.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which invariant failed.
    pub invariant: &'static str,
    /// What was observed.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Name shown in violations.
    fn name(&self) -> &'static str;

    /// Inspect `state`.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants checked together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|i| i.name())).finish()
    }
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Every room synchronization invariant:
    /// - [`NoDuplicateMessages`]: message ids are unique in the window
    /// - [`WindowOrdered`]: the window ascends by `created_at`
    /// - [`WindowMatchesActiveRoom`]: no message of another room is shown
    /// - [`SessionTicketsAgree`]: all session parts serve the same activation
    /// - [`JoinLeaveSymmetry`]: joins and leaves pair up, one room at a time
    /// - [`SendRequiresJoin`]: messages are only sent to joined rooms
    pub fn standard() -> Self {
        Self::new()
            .with(NoDuplicateMessages)
            .with(WindowOrdered)
            .with(WindowMatchesActiveRoom)
            .with(SessionTicketsAgree)
            .with(JoinLeaveSymmetry)
            .with(SendRequiresJoin)
    }

    /// Append `invariant`.
    #[must_use]
    pub fn with(mut self, invariant: impl Invariant + 'static) -> Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Every violation in `state`, in registration order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|invariant| invariant.check(state).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Fail the running test when `state` violates anything. `context` says
    /// where in the run the snapshot was taken.
    #[allow(clippy::panic, reason = "violations fail the enclosing test")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", lines.join("\n  "));
        }
    }

    /// Names of the registered invariants.
    pub fn names(&self) -> Vec<&'static str> {
        self.invariants.iter().map(|i| i.name()).collect()
    }
}

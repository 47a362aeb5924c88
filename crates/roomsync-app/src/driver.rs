//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Add, time::Duration};

use roomsync_client::{ChannelCommand, FetchRequest, MembershipCheck, ScrollBehavior, ScrollMetrics};

use crate::{App, AppEvent};

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in production and simulation.
///
/// Page fetches and membership checks are fire-and-forget: the driver
/// performs them in the background and reports completion through
/// [`Driver::poll_event`] as [`AppEvent::PageLoaded`] or
/// [`AppEvent::MembershipChecked`], carrying the request's ticket unchanged.
///
/// # Implementations
///
/// - **CLI**: reqwest for REST, tokio-tungstenite for the channel, stdin
/// - **Simulation**: in-memory server with virtual time and viewport
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Add<Duration, Output = Self::Instant>;

    /// Wait for the next input event.
    ///
    /// Returns `None` once the event source is exhausted and the runtime
    /// should stop.
    fn poll_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<AppEvent<Self::Instant>>, Self::Error>> + Send;

    /// Open the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be established. The runtime
    /// reports it to the App as a closed channel.
    fn open_channel(&mut self, token: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the event channel. No-op if not open.
    fn close_channel(&mut self);

    /// Emit a command on the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed or the send fails.
    fn send_command(
        &mut self,
        command: &ChannelCommand,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Start fetching a history page.
    fn fetch_page(&mut self, request: FetchRequest);

    /// Start a clan membership check.
    fn check_membership(&mut self, check: MembershipCheck);

    /// Move the message list viewport.
    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior);

    /// Show a notice to the user.
    fn notify(&mut self, message: &str);

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// Returns the viewport metrics after rendering, `None` if the frontend
    /// has no scrollable message list.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App<Self::Instant>) -> Result<Option<ScrollMetrics>, Self::Error>;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}

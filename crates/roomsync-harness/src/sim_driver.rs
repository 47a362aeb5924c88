//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`roomsync_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Time is virtual (`Duration` since the start of the simulation), the
//! server is a [`SimServer`], and the message list is a fixed-row-height
//! viewport that reports metrics the way a browser does: prepended rows grow
//! `scroll_height` while `scroll_top` stays put.

use std::{
    collections::VecDeque,
    future::{Future, ready},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;
use roomsync_app::{App, AppEvent, Driver};
use roomsync_client::{ChannelCommand, FetchRequest, MembershipCheck, ScrollBehavior, ScrollMetrics};
use roomsync_core::{DenialCode, RequestError, RoomKey, UserId};

use crate::{
    SimServer,
    invariants::{ChannelEvent, InvariantRegistry, SystemSnapshot},
};

/// Default height of one message row (px).
pub const ROW_HEIGHT: f64 = 30.0;

/// Default visible height of the message list (px).
pub const CLIENT_HEIGHT: f64 = 300.0;

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// When REST responses reach the App.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Answered as soon as requested, queued behind pending events.
    #[default]
    Immediate,
    /// Held until released by the test.
    Held,
}

/// Simulated message list viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimViewport {
    /// Height of one message row.
    pub row_height: f64,
    /// Visible height.
    pub client_height: f64,
    /// Current scroll offset.
    pub scroll_top: f64,
    /// Content height after the last render.
    pub scroll_height: f64,
}

impl Default for SimViewport {
    fn default() -> Self {
        Self { row_height: ROW_HEIGHT, client_height: CLIENT_HEIGHT, scroll_top: 0.0, scroll_height: CLIENT_HEIGHT }
    }
}

impl SimViewport {
    /// Current metrics.
    pub fn metrics(&self) -> ScrollMetrics {
        ScrollMetrics::new(self.scroll_top, self.scroll_height, self.client_height)
    }

    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// Shared state for event injection.
///
/// This allows injection from outside async contexts.
#[derive(Debug)]
struct SharedState {
    pending_events: VecDeque<AppEvent<Duration>>,
    server: SimServer,
    user: UserId,
    connected: bool,
    refuse_open: bool,
    fail_sends: bool,
    fail_pages: bool,
    fail_membership: bool,
    delivery: Delivery,
    held_pages: VecDeque<FetchRequest>,
    held_checks: VecDeque<MembershipCheck>,
    channel_log: Vec<ChannelEvent>,
    viewport: SimViewport,
    scrolls: Vec<(f64, ScrollBehavior)>,
    notices: Vec<String>,
    renders: usize,
    now: Duration,
}

impl SharedState {
    fn new(user: UserId) -> Self {
        Self {
            pending_events: VecDeque::new(),
            server: SimServer::new(),
            user,
            connected: false,
            refuse_open: false,
            fail_sends: false,
            fail_pages: false,
            fail_membership: false,
            delivery: Delivery::default(),
            held_pages: VecDeque::new(),
            held_checks: VecDeque::new(),
            channel_log: Vec::new(),
            viewport: SimViewport::default(),
            scrolls: Vec::new(),
            notices: Vec::new(),
            renders: 0,
            now: Duration::ZERO,
        }
    }

    fn resolve_page(&mut self, request: FetchRequest) {
        let result = if self.fail_pages {
            Err(RequestError::Status(503))
        } else {
            Ok(self.server.page(request.room(), request.page))
        };
        self.pending_events.push_back(AppEvent::PageLoaded { request, result });
    }

    fn resolve_check(&mut self, check: MembershipCheck) {
        let result = if self.fail_membership {
            Err(RequestError::Network("connection reset".into()))
        } else {
            Ok(self.server.is_member(&check.clan_id, &check.user_id))
        };
        self.pending_events.push_back(AppEvent::MembershipChecked { ticket: check.ticket, result });
    }

    fn set_scroll_top(&mut self, top: f64) -> bool {
        let clamped = top.clamp(0.0, self.viewport.max_scroll_top());
        let moved = clamped != self.viewport.scroll_top;
        self.viewport.scroll_top = clamped;
        moved
    }

    fn end_channel(&mut self) {
        self.connected = false;
        self.channel_log.push(ChannelEvent::Closed);
        self.server.disconnect();
    }
}

/// Simulation driver for deterministic testing.
///
/// Implements [`Driver`] trait so the same [`roomsync_app::Runtime`]
/// orchestration code runs in both production and simulation tests.
#[derive(Debug)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Create a driver whose channel sends as `user`.
    pub fn new(user: UserId) -> Self {
        Self { state: Arc::new(Mutex::new(SharedState::new(user))), invariants: None }
    }

    /// Enable invariant checking after every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Choose when REST responses are delivered.
    #[must_use]
    pub fn with_delivery(self, delivery: Delivery) -> Self {
        self.lock().delivery = delivery;
        self
    }

    /// Access the scripted server.
    pub fn server<R>(&self, f: impl FnOnce(&mut SimServer) -> R) -> R {
        f(&mut self.lock().server)
    }

    /// Inject an `AppEvent` for processing.
    pub fn inject_event(&self, event: AppEvent<Duration>) {
        self.lock().pending_events.push_back(event);
    }

    /// Advance virtual time and inject a tick.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += by;
        let now = state.now;
        state.pending_events.push_back(AppEvent::Tick { now });
    }

    /// Another user posts to `room`. Pushed to the client if subscribed.
    pub fn publish(&self, room: &RoomKey, author: &UserId, content: impl Into<String>) {
        let mut state = self.lock();
        if let Some(frame) = state.server.publish(room, author, content.into())
            && state.connected
        {
            state.pending_events.push_back(AppEvent::Frame(frame));
        }
    }

    /// The server revokes the client's access to `room`.
    pub fn revoke(&self, room: &RoomKey, code: DenialCode) {
        let mut state = self.lock();
        if let Some(frame) = state.server.revoke(room, code) {
            state.pending_events.push_back(AppEvent::Frame(frame));
        }
    }

    /// The channel drops without the client asking.
    pub fn drop_channel(&self, reason: &str) {
        let mut state = self.lock();
        if !state.connected {
            return;
        }
        state.end_channel();
        let now = state.now;
        state.pending_events.push_back(AppEvent::ChannelClosed { reason: reason.to_string(), now });
    }

    /// The user scrolls the message list to `top`.
    pub fn scroll_user(&self, top: f64) {
        let mut state = self.lock();
        state.set_scroll_top(top);
        let metrics = state.viewport.metrics();
        state.pending_events.push_back(AppEvent::Scrolled(metrics));
    }

    /// Refuse subsequent channel opens.
    pub fn set_refuse_open(&self, refuse: bool) {
        self.lock().refuse_open = refuse;
    }

    /// Fail subsequent sends.
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Answer subsequent page requests with a server error.
    pub fn set_fail_pages(&self, fail: bool) {
        self.lock().fail_pages = fail;
    }

    /// Fail subsequent membership checks.
    pub fn set_fail_membership(&self, fail: bool) {
        self.lock().fail_membership = fail;
    }

    /// Deliver held responses in request order.
    pub fn release(&self) {
        let mut state = self.lock();
        while let Some(check) = state.held_checks.pop_front() {
            state.resolve_check(check);
        }
        while let Some(request) = state.held_pages.pop_front() {
            state.resolve_page(request);
        }
    }

    /// Deliver held responses in an order derived from `seed`.
    pub fn release_shuffled(&self, seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = self.lock();
        let mut checks: Vec<_> = state.held_checks.drain(..).collect();
        let mut pages: Vec<_> = state.held_pages.drain(..).collect();
        checks.shuffle(&mut rng);
        pages.shuffle(&mut rng);
        for check in checks {
            state.resolve_check(check);
        }
        for request in pages {
            state.resolve_page(request);
        }
    }

    /// Number of held page requests.
    pub fn held_pages(&self) -> usize {
        self.lock().held_pages.len()
    }

    /// Number of held membership checks.
    pub fn held_checks(&self) -> usize {
        self.lock().held_checks.len()
    }

    /// Check if there are pending events to process.
    pub fn has_pending(&self) -> bool {
        !self.lock().pending_events.is_empty()
    }

    /// Channel opens, closes and commands so far.
    pub fn channel_log(&self) -> Vec<ChannelEvent> {
        self.lock().channel_log.clone()
    }

    /// Commands emitted on the channel so far.
    pub fn commands(&self) -> Vec<ChannelCommand> {
        self.lock()
            .channel_log
            .iter()
            .filter_map(|event| match event {
                ChannelEvent::Command(command) => Some(command.clone()),
                ChannelEvent::Opened | ChannelEvent::Closed => None,
            })
            .collect()
    }

    /// Channel is open.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Current viewport.
    pub fn viewport(&self) -> SimViewport {
        self.lock().viewport
    }

    /// Scroll commands executed so far.
    pub fn scrolls(&self) -> Vec<(f64, ScrollBehavior)> {
        self.lock().scrolls.clone()
    }

    /// Notices shown so far.
    pub fn notices(&self) -> Vec<String> {
        self.lock().notices.clone()
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        self.lock().renders
    }

    /// Create a snapshot from App state for invariant checking.
    pub fn snapshot(&self, app: &App<Duration>) -> SystemSnapshot {
        SystemSnapshot::capture(app, &self.lock().channel_log)
    }

    /// Check the configured invariants against `app`.
    pub fn check_invariants(&self, app: &App<Duration>, context: &str) {
        if let Some(registry) = &self.invariants {
            registry.assert_all(&self.snapshot(app), context);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = Duration;

    fn poll_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<AppEvent<Duration>>, Self::Error>> + Send {
        ready(Ok(self.lock().pending_events.pop_front()))
    }

    fn open_channel(&mut self, _token: &str) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let mut state = self.lock();
        let result = if state.refuse_open {
            Err(SimDriverError("connection refused".into()))
        } else {
            state.connected = true;
            state.server.disconnect();
            state.channel_log.push(ChannelEvent::Opened);
            Ok(())
        };
        ready(result)
    }

    fn close_channel(&mut self) {
        let mut state = self.lock();
        if state.connected {
            state.end_channel();
        }
    }

    fn send_command(
        &mut self,
        command: &ChannelCommand,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let mut state = self.lock();
        let result = if !state.connected {
            Err(SimDriverError("channel closed".into()))
        } else if state.fail_sends && matches!(command, ChannelCommand::Send { .. }) {
            Err(SimDriverError("send rejected".into()))
        } else {
            state.channel_log.push(ChannelEvent::Command(command.clone()));
            let user = state.user.clone();
            let pushed = state.server.handle_frame(&command.to_frame(), &user);
            state.pending_events.extend(pushed.into_iter().map(AppEvent::Frame));
            Ok(())
        };
        ready(result)
    }

    fn fetch_page(&mut self, request: FetchRequest) {
        let mut state = self.lock();
        match state.delivery {
            Delivery::Immediate => state.resolve_page(request),
            Delivery::Held => state.held_pages.push_back(request),
        }
    }

    fn check_membership(&mut self, check: MembershipCheck) {
        let mut state = self.lock();
        match state.delivery {
            Delivery::Immediate => state.resolve_check(check),
            Delivery::Held => state.held_checks.push_back(check),
        }
    }

    fn scroll_to(&mut self, top: f64, behavior: ScrollBehavior) {
        let mut state = self.lock();
        state.scrolls.push((top, behavior));
        if state.set_scroll_top(top) {
            let metrics = state.viewport.metrics();
            state.pending_events.push_back(AppEvent::Scrolled(metrics));
        }
    }

    fn notify(&mut self, message: &str) {
        self.lock().notices.push(message.to_string());
    }

    fn now(&self) -> Duration {
        self.lock().now
    }

    fn render(&mut self, app: &App<Duration>) -> Result<Option<ScrollMetrics>, Self::Error> {
        let metrics = {
            let mut state = self.lock();
            state.renders += 1;
            let rows = app.session().map_or(0, |s| s.messages().len());
            let viewport = &mut state.viewport;
            viewport.scroll_height = (rows as f64 * viewport.row_height).max(viewport.client_height);
            viewport.scroll_top = viewport.scroll_top.min(viewport.max_scroll_top());
            viewport.metrics()
        };
        self.check_invariants(app, "after render");
        Ok(Some(metrics))
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        if state.connected {
            state.end_channel();
        }
    }
}

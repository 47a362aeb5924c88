//! Console driver for the CLI.
//!
//! Implements the [`Driver`] trait over stdin/stdout. REST requests run on
//! spawned tasks and report back through an internal queue; the event
//! channel is the WebSocket from [`roomsync_client::transport`].
//!
//! The transcript is append-only, so the driver keeps a virtual viewport of
//! [`VISIBLE_LINES`] rows to answer the scroll anchor.

use std::{
    collections::HashSet,
    io::{self, Write},
    time::{Duration, Instant},
};

use roomsync_app::{App, AppEvent, Driver};
use roomsync_client::{
    ChannelCommand, FetchRequest, MembershipCheck, ScrollBehavior, ScrollMetrics,
    transport::{self, ChannelHandle, HttpApi, TransportConfig, TransportError},
};
use roomsync_core::{Message, MessageId, RoomKey, wire::ServerFrame};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
    time::{Interval, MissedTickBehavior},
};

use crate::input::{self, Command};

/// Rows of the virtual viewport.
pub const VISIBLE_LINES: usize = 24;

/// Height of one transcript row in viewport pixels.
pub const LINE_HEIGHT: f64 = 20.0;

/// Interval between ticks driving reconnect timers.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Driver errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// I/O error on stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command emitted while the channel is closed.
    #[error("event channel is not open")]
    ChannelClosed,
}

/// What woke up the event loop.
enum Wakeup {
    Event(AppEvent),
    Frame(Option<ServerFrame>),
    Line(io::Result<Option<String>>),
    Tick,
}

/// Viewport over the transcript.
#[derive(Debug, Clone, Copy, Default)]
struct Viewport {
    rows: usize,
    scroll_top: f64,
}

impl Viewport {
    fn metrics(&self) -> ScrollMetrics {
        let client_height = VISIBLE_LINES as f64 * LINE_HEIGHT;
        let scroll_height = (self.rows as f64 * LINE_HEIGHT).max(client_height);
        let scroll_top = self.scroll_top.clamp(0.0, scroll_height - client_height);
        ScrollMetrics::new(scroll_top, scroll_height, client_height)
    }
}

/// Tracks what has been printed so renders only emit new lines.
#[derive(Debug, Default)]
struct Transcript {
    room: Option<RoomKey>,
    printed: HashSet<MessageId>,
    newest: Option<chrono::DateTime<chrono::Utc>>,
    status: Option<String>,
}

impl Transcript {
    /// Lines to print for the current state.
    ///
    /// Messages older than the newest printed one arrived with an older
    /// page and are marked with `^`.
    fn update(&mut self, room: Option<&RoomKey>, messages: &[Message], status: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();

        if self.room.as_ref() != room {
            self.room = room.cloned();
            self.printed.clear();
            self.newest = None;
            if let Some(room) = room {
                lines.push(format!("-- {room} --"));
            }
        }

        let newest = self.newest;
        for message in messages {
            if !self.printed.insert(message.id.clone()) {
                continue;
            }
            let marker = if newest.is_some_and(|n| message.created_at < n) { "^" } else { " " };
            lines.push(format!("{marker}{}", format_message(message)));
            self.newest = self.newest.max(Some(message.created_at));
        }

        if status != self.status.as_deref() {
            self.status = status.map(str::to_string);
            if let Some(status) = status {
                lines.push(format!("* {status}"));
            }
        }

        lines
    }
}

fn format_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M:%S"),
        message.author_id,
        message.content
    )
}

/// Console driver implementing the [`Driver`] trait.
pub struct ConsoleDriver {
    api: HttpApi,
    transport: TransportConfig,
    channel: Option<ChannelHandle>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
    stdin: Option<Lines<BufReader<Stdin>>>,
    tick: Interval,
    viewport: Viewport,
    transcript: Transcript,
}

impl ConsoleDriver {
    /// Create a driver talking to the API at `transport.base_url`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: TransportConfig, token: Option<String>) -> Result<Self, RuntimeError> {
        let api = HttpApi::new(transport.clone(), token)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Ok(Self {
            api,
            transport,
            channel: None,
            events_tx,
            events_rx,
            stdin: Some(BufReader::new(tokio::io::stdin()).lines()),
            tick,
            viewport: Viewport::default(),
            transcript: Transcript::default(),
        })
    }

    /// Queue an event ahead of user input, e.g. the room to open on start.
    pub fn push_event(&mut self, event: AppEvent) {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self.events_tx.send(event);
    }

    fn write_lines(lines: &[String]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }

    /// Turn an input line into an event. `None` if nothing should happen.
    fn line_event(&mut self, line: &str) -> io::Result<Option<AppEvent>> {
        let command = match input::parse(line) {
            Ok(command) => command,
            Err(message) => {
                Self::write_lines(&[format!("! {message}")])?;
                return Ok(None);
            },
        };

        Ok(Some(match command {
            Command::Send(content) => AppEvent::Send { content },
            Command::Open(room) => AppEvent::OpenRoom(room),
            Command::Close => AppEvent::CloseRoom,
            Command::Older => {
                self.viewport.scroll_top = 0.0;
                AppEvent::Scrolled(self.viewport.metrics())
            },
            Command::Retry => AppEvent::RetryHistory,
            Command::Quit => AppEvent::Quit,
        }))
    }
}

async fn next_frame(channel: Option<&mut ChannelHandle>) -> Option<ServerFrame> {
    match channel {
        Some(channel) => channel.from_server.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_line(stdin: Option<&mut Lines<BufReader<Stdin>>>) -> io::Result<Option<String>> {
    match stdin {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

impl Driver for ConsoleDriver {
    type Error = RuntimeError;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        loop {
            let wakeup = tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => Wakeup::Event(event),
                frame = next_frame(self.channel.as_mut()) => Wakeup::Frame(frame),
                line = next_line(self.stdin.as_mut()) => Wakeup::Line(line),
                _ = self.tick.tick() => Wakeup::Tick,
            };

            match wakeup {
                Wakeup::Event(event) => return Ok(Some(event)),
                Wakeup::Frame(Some(frame)) => return Ok(Some(AppEvent::Frame(frame))),
                Wakeup::Frame(None) => {
                    self.close_channel();
                    let now = self.now();
                    return Ok(Some(AppEvent::ChannelClosed { reason: "connection lost".into(), now }));
                },
                Wakeup::Line(Ok(Some(line))) => {
                    if let Some(event) = self.line_event(&line)? {
                        return Ok(Some(event));
                    }
                },
                Wakeup::Line(Ok(None)) => {
                    tracing::debug!("stdin closed");
                    self.stdin = None;
                    return Ok(Some(AppEvent::Quit));
                },
                Wakeup::Line(Err(e)) => return Err(e.into()),
                Wakeup::Tick => return Ok(Some(AppEvent::Tick { now: self.now() })),
            }
        }
    }

    async fn open_channel(&mut self, token: &str) -> Result<(), Self::Error> {
        let handle = transport::connect(&self.transport, token).await?;
        if let Some(previous) = self.channel.replace(handle) {
            previous.stop();
        }
        tracing::info!(url = %self.transport.base_url, "event channel open");
        Ok(())
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.stop();
        }
    }

    async fn send_command(&mut self, command: &ChannelCommand) -> Result<(), Self::Error> {
        let frame = command.to_frame();
        let channel = self.channel.as_ref().ok_or(RuntimeError::ChannelClosed)?;
        channel.to_server.send(frame).await.map_err(|_| RuntimeError::ChannelClosed)
    }

    fn fetch_page(&mut self, request: FetchRequest) {
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_page(request.room(), request.page).await;
            let _ = events.send(AppEvent::PageLoaded { request, result });
        });
    }

    fn check_membership(&mut self, check: MembershipCheck) {
        let api = self.api.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.check_membership(&check.user_id, &check.clan_id).await;
            let _ = events.send(AppEvent::MembershipChecked { ticket: check.ticket, result });
        });
    }

    fn scroll_to(&mut self, top: f64, _behavior: ScrollBehavior) {
        self.viewport.scroll_top = top;
    }

    fn notify(&mut self, message: &str) {
        // The App keeps the notice as its status; don't print it twice.
        self.transcript.status = Some(message.to_string());
        if let Err(e) = Self::write_lines(&[format!("! {message}")]) {
            tracing::warn!(error = %e, "failed to write notice");
        }
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App) -> Result<Option<ScrollMetrics>, Self::Error> {
        let messages = app.session().map(|s| s.messages()).unwrap_or_default();
        self.viewport.rows = messages.len();

        let lines = self.transcript.update(app.active_room(), messages, app.status_message());
        Self::write_lines(&lines)?;

        Ok(app.session().map(|_| self.viewport.metrics()))
    }

    fn stop(&mut self) {
        self.close_channel();
    }
}

impl Drop for ConsoleDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

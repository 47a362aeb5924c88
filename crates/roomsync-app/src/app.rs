//! Application state machine.
//!
//! This module defines the [`App`] state machine, which owns everything that
//! outlives a single room: the connection lifecycle, the session identity and
//! the last known viewport. The state of the room being viewed lives in a
//! [`RoomSession`] that is replaced wholesale on navigation.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Opens the channel only for an authenticated identity.
//! - Tears the previous room down (leave emitted) before the next room's state
//!   is created, and stamps each activation with a fresh generation.
//! - Routes completions and pushed frames to the active session.

use std::{ops::Add, time::Duration};

use roomsync_client::{
    ConnectionAction, ConnectionManager, ConnectionState, ScrollCommand, ScrollMetrics, SendError,
};
use roomsync_core::{Identity, RoomKey, Ticket, wire::ServerFrame};

use crate::{AppAction, AppEvent, RoomSession, SyncConfig};

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App<I = std::time::Instant> {
    config: SyncConfig,
    connection: ConnectionManager<I>,
    identity: Identity,
    /// Active room. `None` if no room is open.
    session: Option<RoomSession>,
    /// Generation of the most recent activation.
    generation: u64,
    /// Last viewport reported by the driver. `None` before the first render.
    viewport: Option<ScrollMetrics>,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
}

impl<I> App<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create an App for `identity`. Nothing is connected until
    /// [`App::connect`] is called.
    pub fn new(identity: Identity, config: SyncConfig) -> Self {
        Self {
            connection: ConnectionManager::new(config.reconnect),
            config,
            identity,
            session: None,
            generation: 0,
            viewport: None,
            status_message: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent<I>) -> Vec<AppAction> {
        let actions = match event {
            AppEvent::Tick { now } => map_connection(self.connection.handle_tick(now)),
            AppEvent::Connect => self.connect(),
            AppEvent::Disconnect => self.disconnect(),
            AppEvent::IdentityChanged(identity) => self.set_identity(identity),
            AppEvent::OpenRoom(room) => self.open_room(room),
            AppEvent::CloseRoom => self.close_room(),
            AppEvent::Send { content } => match self.send_message(&content) {
                Ok(actions) => actions,
                Err(e) => vec![AppAction::Notify { message: e.to_string() }, AppAction::Render],
            },
            AppEvent::RetryHistory => self.retry_history(),
            AppEvent::Quit => self.quit(),
            AppEvent::ChannelOpened => {
                self.connection.handle_opened();
                let mut actions = self.advance_session();
                actions.push(AppAction::Render);
                actions
            },
            AppEvent::ChannelClosed { reason, now } => {
                let error = self.connection.handle_closed(now, &reason);
                if let Some(session) = &mut self.session {
                    session.handle_disconnected();
                }
                if let Some(error) = error {
                    self.status_message = Some(error.to_string());
                }
                vec![AppAction::Render]
            },
            AppEvent::Frame(frame) => self.handle_frame(frame),
            AppEvent::MembershipChecked { ticket, result } => match &mut self.session {
                Some(session) => session.handle_membership_result(&ticket, result),
                None => {
                    tracing::debug!(%ticket, "membership result with no active room");
                    vec![]
                },
            },
            AppEvent::PageLoaded { request, result } => {
                let viewport = self.viewport.unwrap_or_default();
                match &mut self.session {
                    Some(session) => session.handle_page(&request, result, viewport),
                    None => {
                        tracing::debug!(ticket = %request.ticket, "page with no active room");
                        vec![]
                    },
                }
            },
            AppEvent::SendFailed { room, reason } => match &mut self.session {
                Some(session) => session.handle_send_failed(room, &reason),
                None => vec![AppAction::Notify { message: reason }],
            },
            AppEvent::Scrolled(metrics) => {
                self.viewport = Some(metrics);
                match &mut self.session {
                    Some(session) => session.handle_scrolled(metrics),
                    None => vec![],
                }
            },
            AppEvent::Rendered(metrics) => self.handle_rendered(metrics),
        };

        if let Some(AppAction::Notify { message }) =
            actions.iter().rev().find(|a| matches!(a, AppAction::Notify { .. }))
        {
            self.status_message = Some(message.clone());
        }
        actions
    }

    /// Open the channel for the current identity.
    pub fn connect(&mut self) -> Vec<AppAction> {
        match self.connection.connect(&self.identity) {
            Ok(actions) => {
                let mut out = map_connection(actions);
                out.push(AppAction::Render);
                out
            },
            Err(e) => {
                tracing::info!(error = %e, "not connecting");
                vec![AppAction::Notify { message: e.to_string() }, AppAction::Render]
            },
        }
    }

    /// Close the channel. Room and message state is kept; the room re-joins on
    /// the next connection.
    pub fn disconnect(&mut self) -> Vec<AppAction> {
        let mut out = map_connection(self.connection.disconnect());
        if let Some(session) = &mut self.session {
            session.handle_disconnected();
        }
        out.push(AppAction::Render);
        out
    }

    /// Replace the session identity.
    ///
    /// A different user re-activates the open room so membership is
    /// negotiated for them. Losing authentication closes the channel;
    /// gaining it opens one.
    pub fn set_identity(&mut self, identity: Identity) -> Vec<AppAction> {
        let user_changed = identity.user_id != self.identity.user_id;
        let authenticated = identity.is_authenticated();
        self.identity = identity;

        let mut out = Vec::new();
        if !authenticated {
            out.extend(self.disconnect());
        }
        if user_changed && let Some(room) = self.active_room().cloned() {
            out.extend(self.activate(room));
        }
        if authenticated && self.connection.state() == ConnectionState::Disconnected {
            out.extend(self.connect());
        }
        out.push(AppAction::Render);
        out
    }

    /// Navigate to `room`. The previous room is left before any request for
    /// the new one is issued. Re-opening the active room is a no-op.
    pub fn open_room(&mut self, room: RoomKey) -> Vec<AppAction> {
        if self.active_room() == Some(&room) {
            return vec![];
        }
        let mut out = self.activate(room);
        out.push(AppAction::Render);
        out
    }

    /// Navigate away from the active room.
    pub fn close_room(&mut self) -> Vec<AppAction> {
        let Some(mut session) = self.session.take() else {
            return vec![];
        };
        let mut out = session.teardown();
        out.push(AppAction::Render);
        out
    }

    /// Send `content` to the active room.
    ///
    /// # Errors
    ///
    /// - `SendError::NoActiveRoom` if no room is open
    /// - `SendError::EmptyContent` if `content` is blank
    /// - `SendError::NotJoined` if the room has not been joined
    pub fn send_message(&mut self, content: &str) -> Result<Vec<AppAction>, SendError> {
        let session = self.session.as_mut().ok_or(SendError::NoActiveRoom)?;
        session.send(content)
    }

    /// Retry a failed initial history load of the active room.
    pub fn retry_history(&mut self) -> Vec<AppAction> {
        self.session.as_mut().map(RoomSession::retry_history).unwrap_or_default()
    }

    /// Leave the active room, close the channel and quit.
    pub fn quit(&mut self) -> Vec<AppAction> {
        let mut out = self.close_room();
        out.extend(map_connection(self.connection.disconnect()));
        out.retain(|a| *a != AppAction::Render);
        out.push(AppAction::Quit);
        out
    }

    /// Sync settings.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Channel state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Channel is established.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// When the next reconnect attempt is due. `None` if none scheduled.
    pub fn retry_at(&self) -> Option<I> {
        self.connection.retry_at()
    }

    /// Session identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Active room state. `None` if no room is open.
    pub fn session(&self) -> Option<&RoomSession> {
        self.session.as_ref()
    }

    /// Active room. `None` if no room is open.
    pub fn active_room(&self) -> Option<&RoomKey> {
        self.session.as_ref().map(RoomSession::room)
    }

    /// Generation of the most recent activation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last viewport reported by the driver.
    pub fn viewport(&self) -> Option<ScrollMetrics> {
        self.viewport
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    fn activate(&mut self, room: RoomKey) -> Vec<AppAction> {
        let mut out = self.close_room();
        out.retain(|a| *a != AppAction::Render);

        self.generation += 1;
        let ticket = Ticket::new(room, self.generation);
        tracing::debug!(%ticket, "activating room");
        self.session = Some(RoomSession::new(ticket, self.config.bottom_threshold));
        out.extend(self.advance_session());
        out
    }

    fn advance_session(&mut self) -> Vec<AppAction> {
        let connected = self.connection.is_connected();
        match &mut self.session {
            Some(session) => session.advance(connected, &self.identity),
            None => vec![],
        }
    }

    fn handle_frame(&mut self, frame: ServerFrame) -> Vec<AppAction> {
        let viewport = self.viewport.unwrap_or_default();
        let Some(session) = &mut self.session else {
            tracing::debug!("frame with no active room");
            return vec![];
        };
        match frame {
            ServerFrame::Message { message } => session.handle_pushed(message, viewport),
            ServerFrame::AccessDenied { room_kind, code, message } => {
                session.handle_access_denied(room_kind, code, &message)
            },
        }
    }

    fn handle_rendered(&mut self, metrics: ScrollMetrics) -> Vec<AppAction> {
        self.viewport = Some(metrics);
        let command = self.session.as_mut().and_then(|s| s.handle_rendered(metrics));
        match command {
            Some(ScrollCommand::ScrollTo { top, behavior }) => {
                self.viewport = Some(ScrollMetrics { scroll_top: top, ..metrics });
                vec![AppAction::ScrollTo { top, behavior }]
            },
            Some(ScrollCommand::LoadMore) | None => vec![],
        }
    }
}

fn map_connection(actions: Vec<ConnectionAction>) -> Vec<AppAction> {
    actions
        .into_iter()
        .map(|action| match action {
            ConnectionAction::Open { token } => AppAction::OpenChannel { token },
            ConnectionAction::Close => AppAction::CloseChannel,
        })
        .collect()
}

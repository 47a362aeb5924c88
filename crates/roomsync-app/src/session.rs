//! State of one room activation.
//!
//! A [`RoomSession`] is created when the user navigates to a room and dropped
//! when they navigate away. Every asynchronous request it issues carries the
//! session's [`Ticket`], so responses for a previous activation of the same
//! room never leak into this one.

use roomsync_client::{
    ChannelCommand, FetchPurpose, FetchRequest, MembershipAction, MembershipController,
    MembershipDecision, MessageHistory, PageOutcome, PushOutcome, ScrollAnchor, ScrollCommand,
    ScrollMetrics, SendCoordinator, SendError,
};
use roomsync_core::{
    DenialCategory, DenialCode, Identity, Message, MessagePage, RequestError, RoomKey, RoomKind,
    Ticket,
};

use crate::AppAction;

/// Membership, history, scroll anchor and send state of the active room.
#[derive(Debug, Clone)]
pub struct RoomSession {
    membership: MembershipController,
    history: MessageHistory,
    scroll: ScrollAnchor,
    send: SendCoordinator,
}

impl RoomSession {
    /// Create the state for a new activation.
    pub fn new(ticket: Ticket, bottom_threshold: f64) -> Self {
        Self {
            membership: MembershipController::new(ticket.clone()),
            history: MessageHistory::new(ticket),
            scroll: ScrollAnchor::new(bottom_threshold),
            send: SendCoordinator::new(),
        }
    }

    /// Ticket of this activation.
    pub fn ticket(&self) -> &Ticket {
        self.membership.ticket()
    }

    /// Room of this activation.
    pub fn room(&self) -> &RoomKey {
        self.membership.room()
    }

    /// Access negotiation state.
    pub fn membership(&self) -> &MembershipController {
        &self.membership
    }

    /// Pending, joined or denied.
    pub fn decision(&self) -> MembershipDecision {
        self.membership.decision()
    }

    /// Message window.
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    /// Viewport bookkeeping.
    pub fn scroll(&self) -> &ScrollAnchor {
        &self.scroll
    }

    /// Most recent send failure. `None` once a later send was accepted.
    pub fn last_send_failure(&self) -> Option<&SendError> {
        self.send.last_failure()
    }

    /// Move membership negotiation forward. A fresh join also requests
    /// history: the first page on the first join, a refresh on a re-join so
    /// messages pushed while the channel was down show up.
    pub(crate) fn advance(&mut self, connected: bool, identity: &Identity) -> Vec<AppAction> {
        let before = self.decision();
        let actions = self.membership.advance(connected, identity);
        let mut out = self.map_membership(actions);
        out.extend(self.denial_notice(&before));
        out
    }

    pub(crate) fn handle_membership_result(
        &mut self,
        ticket: &Ticket,
        result: Result<bool, RequestError>,
    ) -> Vec<AppAction> {
        if ticket != self.ticket() {
            tracing::debug!(%ticket, current = %self.ticket(), "membership result for another activation");
            return vec![];
        }

        let before = self.decision();
        let actions = self.membership.handle_membership_result(ticket, result);
        let mut out = self.map_membership(actions);
        out.extend(self.denial_notice(&before));
        out.push(AppAction::Render);
        out
    }

    pub(crate) fn handle_access_denied(
        &mut self,
        kind: RoomKind,
        code: DenialCode,
        message: &str,
    ) -> Vec<AppAction> {
        let actions = self.membership.handle_access_denied(kind, code.clone());
        if actions.is_empty() {
            return vec![];
        }
        let mut out = self.map_membership(actions);
        out.push(notify_denial(&code, message));
        out.push(AppAction::Render);
        out
    }

    pub(crate) fn handle_disconnected(&mut self) {
        self.membership.handle_disconnected();
    }

    pub(crate) fn handle_pushed(&mut self, message: Message, viewport: ScrollMetrics) -> Vec<AppAction> {
        // Frames the server sent before it processed our leave.
        if !self.membership.is_joined() {
            tracing::debug!(room = %self.room(), id = %message.id, "discarding push for unjoined room");
            return vec![];
        }
        self.scroll.before_append(viewport);
        match self.history.receive_pushed(message) {
            PushOutcome::Appended => vec![AppAction::Render],
            PushOutcome::Duplicate | PushOutcome::OtherRoom => {
                self.scroll.discard_pending();
                vec![]
            },
        }
    }

    pub(crate) fn handle_page(
        &mut self,
        request: &FetchRequest,
        result: Result<MessagePage, RequestError>,
        viewport: ScrollMetrics,
    ) -> Vec<AppAction> {
        let current = request.ticket == *self.ticket();
        if current {
            match request.purpose {
                FetchPurpose::Older => self.scroll.before_prepend(viewport),
                FetchPurpose::Refresh => self.scroll.before_append(viewport),
                // A push rendered first: page 1 lands above what is visible.
                FetchPurpose::Initial if self.scroll.is_initial_done() => {
                    self.scroll.before_prepend(viewport);
                },
                FetchPurpose::Initial => {},
            }
        }

        match self.history.apply_page(request, result) {
            Ok(PageOutcome::Stale) => {
                if current {
                    self.scroll.discard_pending();
                }
                vec![]
            },
            Ok(
                PageOutcome::Initial { added }
                | PageOutcome::Prepended { added }
                | PageOutcome::Merged { added },
            ) => {
                if added == 0 {
                    self.scroll.discard_pending();
                }
                vec![AppAction::Render]
            },
            Err(e) => {
                self.scroll.discard_pending();
                let message = if e.is_transient() { format!("{e}, try again") } else { e.to_string() };
                vec![AppAction::Notify { message }, AppAction::Render]
            },
        }
    }

    pub(crate) fn handle_scrolled(&mut self, metrics: ScrollMetrics) -> Vec<AppAction> {
        match self.scroll.on_scroll(metrics, self.history.can_load_more()) {
            Some(ScrollCommand::LoadMore) => {
                self.history.load_more().map(AppAction::FetchPage).into_iter().collect()
            },
            Some(ScrollCommand::ScrollTo { top, behavior }) => vec![AppAction::ScrollTo { top, behavior }],
            None => vec![],
        }
    }

    pub(crate) fn handle_rendered(&mut self, metrics: ScrollMetrics) -> Option<ScrollCommand> {
        self.scroll.after_render(metrics, self.history.len())
    }

    pub(crate) fn send(&mut self, content: &str) -> Result<Vec<AppAction>, SendError> {
        let command = self.send.prepare(&self.membership, content)?;
        let mut out = vec![AppAction::Channel(command)];
        out.extend(self.history.refresh().map(AppAction::FetchPage));
        Ok(out)
    }

    pub(crate) fn handle_send_failed(&mut self, room: RoomKey, reason: &str) -> Vec<AppAction> {
        let error = self.send.handle_emission_failure(room, reason);
        vec![AppAction::Notify { message: error.to_string() }, AppAction::Render]
    }

    pub(crate) fn retry_history(&mut self) -> Vec<AppAction> {
        if !self.membership.is_joined() {
            return vec![];
        }
        self.history.retry_initial().map(AppAction::FetchPage).into_iter().collect()
    }

    /// End the activation, emitting the leave if the room was joined.
    pub(crate) fn teardown(&mut self) -> Vec<AppAction> {
        self.scroll.reset();
        self.membership.teardown().map(AppAction::Channel).into_iter().collect()
    }

    /// Notice for a denial reached since `before`.
    fn denial_notice(&self, before: &MembershipDecision) -> Option<AppAction> {
        match self.decision() {
            MembershipDecision::Denied(code) if *before != MembershipDecision::Denied(code.clone()) => {
                Some(notify_denial(&code, ""))
            },
            _ => None,
        }
    }

    fn map_membership(&mut self, actions: Vec<MembershipAction>) -> Vec<AppAction> {
        let mut out = Vec::with_capacity(actions.len() + 1);
        for action in actions {
            match action {
                MembershipAction::Channel(command) => {
                    let joined = matches!(command, ChannelCommand::Join(_));
                    out.push(AppAction::Channel(command));
                    if joined {
                        let fetch = self.history.load_initial().or_else(|| self.history.refresh());
                        out.extend(fetch.map(AppAction::FetchPage));
                    }
                },
                MembershipAction::CheckMembership(check) => out.push(AppAction::CheckMembership(check)),
            }
        }
        out
    }
}

/// User-facing notice for a denial. A message supplied by the server wins.
fn notify_denial(code: &DenialCode, server_message: &str) -> AppAction {
    let message = if server_message.is_empty() {
        match code.category() {
            DenialCategory::SignIn => "Sign in to chat in this room".to_string(),
            DenialCategory::RequestToJoin => "Request to join to chat in this room".to_string(),
            DenialCategory::Banned => "You are banned from this room".to_string(),
            DenialCategory::Locked => "This room is private".to_string(),
            DenialCategory::Retry => "Could not verify membership, try again later".to_string(),
            DenialCategory::Unknown => format!("Access denied ({code})"),
        }
    } else {
        server_message.to_string()
    };
    AppAction::Notify { message }
}

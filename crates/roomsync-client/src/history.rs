//! Message window of the active room.
//!
//! [`MessageHistory`] merges two unordered sources into one ordered window:
//! REST pages (initial, older, refresh) and messages pushed by the channel.
//! Both paths deduplicate by message id because they race and can deliver
//! the same message.
//!
//! # Invariants
//!
//! - The window never holds two messages with the same id.
//! - The window is sorted ascending by `created_at`.
//! - Only messages of the activation's room enter the window.
//! - A failed older-page fetch leaves `page` and `has_more` untouched.

use std::collections::HashSet;

use roomsync_core::{Message, MessageId, MessagePage, RequestError, RoomKey, Ticket};

use crate::{
    action::{FetchPurpose, FetchRequest},
    error::HistoryError,
};

/// Initial load progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitialLoad {
    NotStarted,
    InFlight,
    Done { failed: bool },
}

/// Result of applying a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Response belonged to another activation and was discarded.
    Stale,
    /// Initial page populated the window.
    Initial {
        /// Messages added.
        added: usize,
    },
    /// Older page was prepended.
    Prepended {
        /// Messages added.
        added: usize,
    },
    /// Refreshed newest page was merged.
    Merged {
        /// Messages added.
        added: usize,
    },
}

/// Result of receiving a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Message appended to the window.
    Appended,
    /// Message already present.
    Duplicate,
    /// Message belongs to another room and was discarded.
    OtherRoom,
}

/// Ordered, deduplicated message window for one room activation.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    ticket: Ticket,
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    /// Older pages exist.
    has_more: bool,
    /// Highest page merged so far. 0 before the initial load.
    page: u32,
    initial: InitialLoad,
    loading_more: bool,
    refreshing: bool,
}

impl MessageHistory {
    /// Create an empty window for a room activation.
    pub fn new(ticket: Ticket) -> Self {
        Self {
            ticket,
            messages: Vec::new(),
            ids: HashSet::new(),
            has_more: false,
            page: 0,
            initial: InitialLoad::NotStarted,
            loading_more: false,
            refreshing: false,
        }
    }

    /// Activation this window belongs to.
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Room this window belongs to.
    pub fn room(&self) -> &RoomKey {
        &self.ticket.room
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages in the window.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Window holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Older pages exist.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Highest page merged so far.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Initial page has been applied (successfully or not).
    pub fn is_initialized(&self) -> bool {
        matches!(self.initial, InitialLoad::Done { .. })
    }

    /// Initial or older page fetch in flight.
    pub fn is_loading(&self) -> bool {
        self.initial == InitialLoad::InFlight || self.loading_more
    }

    /// An older page may be requested now.
    pub fn can_load_more(&self) -> bool {
        self.has_more && !self.loading_more && self.is_initialized()
    }

    /// Request the first page. Only once per activation.
    pub fn load_initial(&mut self) -> Option<FetchRequest> {
        if self.initial != InitialLoad::NotStarted {
            return None;
        }
        self.initial = InitialLoad::InFlight;
        Some(self.request(1, FetchPurpose::Initial))
    }

    /// Re-request the first page after a failed initial load.
    pub fn retry_initial(&mut self) -> Option<FetchRequest> {
        if self.initial != (InitialLoad::Done { failed: true }) {
            return None;
        }
        self.initial = InitialLoad::NotStarted;
        self.load_initial()
    }

    /// Request the next older page.
    ///
    /// Returns `None` unless older pages exist, the initial load completed,
    /// and no older page is already in flight.
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        if !self.can_load_more() {
            return None;
        }
        self.loading_more = true;
        Some(self.request(self.page + 1, FetchPurpose::Older))
    }

    /// Re-fetch the newest page so authoritative copies of recently sent
    /// messages replace any assumption the view made.
    pub fn refresh(&mut self) -> Option<FetchRequest> {
        if self.refreshing || !self.is_initialized() {
            return None;
        }
        self.refreshing = true;
        Some(self.request(1, FetchPurpose::Refresh))
    }

    /// Apply a page response.
    ///
    /// Responses for another activation are discarded. Failures clear the
    /// in-flight flag of the request and are reported without further
    /// mutation, except a failed initial load which settles on an empty
    /// window with `has_more = false`.
    pub fn apply_page(
        &mut self,
        request: &FetchRequest,
        result: Result<MessagePage, RequestError>,
    ) -> Result<PageOutcome, HistoryError> {
        if request.ticket != self.ticket {
            tracing::debug!(
                request = %request.ticket,
                current = %self.ticket,
                page = request.page,
                "discarding stale page"
            );
            return Ok(PageOutcome::Stale);
        }

        match request.purpose {
            FetchPurpose::Initial => {
                if self.initial != InitialLoad::InFlight {
                    return Ok(PageOutcome::Stale);
                }
                match result {
                    Ok(page) => {
                        self.initial = InitialLoad::Done { failed: false };
                        self.page = 1;
                        self.has_more = page.pagination.has_more;
                        let added = self.merge(page.messages);
                        Ok(PageOutcome::Initial { added })
                    },
                    Err(source) => {
                        self.initial = InitialLoad::Done { failed: true };
                        self.has_more = false;
                        Err(self.fetch_error(request, source))
                    },
                }
            },
            FetchPurpose::Older => {
                if !self.loading_more {
                    return Ok(PageOutcome::Stale);
                }
                self.loading_more = false;
                let page = result.map_err(|source| self.fetch_error(request, source))?;
                self.page = request.page;
                self.has_more = page.pagination.has_more;
                let added = self.prepend(page.messages);
                Ok(PageOutcome::Prepended { added })
            },
            FetchPurpose::Refresh => {
                self.refreshing = false;
                let page = result.map_err(|source| self.fetch_error(request, source))?;
                let added = self.merge(page.messages);
                Ok(PageOutcome::Merged { added })
            },
        }
    }

    /// Accept a message pushed by the channel.
    pub fn receive_pushed(&mut self, message: Message) -> PushOutcome {
        if !message.belongs_to(&self.ticket.room) {
            tracing::debug!(
                message_room = %message.room_key(),
                active = %self.ticket.room,
                "discarding message for another room"
            );
            return PushOutcome::OtherRoom;
        }
        if self.ids.contains(&message.id) {
            return PushOutcome::Duplicate;
        }

        self.ids.insert(message.id.clone());
        match self.messages.last() {
            Some(last) if last.created_at > message.created_at => self.insert_sorted(message),
            _ => self.messages.push(message),
        }
        PushOutcome::Appended
    }

    /// Clear the window for a new activation. In-flight responses issued for
    /// the previous ticket become stale.
    pub fn reset(&mut self, ticket: Ticket) {
        *self = Self::new(ticket);
    }

    fn request(&self, page: u32, purpose: FetchPurpose) -> FetchRequest {
        FetchRequest { ticket: self.ticket.clone(), page, purpose }
    }

    fn fetch_error(&self, request: &FetchRequest, source: RequestError) -> HistoryError {
        tracing::warn!(room = %self.ticket.room, page = request.page, error = %source, "page fetch failed");
        HistoryError::Fetch { room: self.ticket.room.clone(), page: request.page, source }
    }

    /// Sort a page and drop foreign or already-known messages.
    fn admit(&mut self, mut batch: Vec<Message>) -> Vec<Message> {
        batch.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        batch.retain(|m| m.belongs_to(&self.ticket.room) && self.ids.insert(m.id.clone()));
        batch
    }

    /// Insert an older page before the current earliest message.
    fn prepend(&mut self, batch: Vec<Message>) -> usize {
        let batch = self.admit(batch);
        let added = batch.len();

        let fits_before = match (batch.last(), self.messages.first()) {
            (Some(newest), Some(earliest)) => newest.created_at <= earliest.created_at,
            _ => true,
        };

        if fits_before {
            self.messages.splice(0..0, batch);
        } else {
            for message in batch {
                self.insert_sorted(message);
            }
        }
        added
    }

    /// Merge a page anywhere in the window.
    fn merge(&mut self, batch: Vec<Message>) -> usize {
        let batch = self.admit(batch);
        let added = batch.len();
        for message in batch {
            match self.messages.last() {
                Some(last) if last.created_at > message.created_at => self.insert_sorted(message),
                _ => self.messages.push(message),
            }
        }
        added
    }

    /// Insert after every message with an equal or earlier timestamp.
    fn insert_sorted(&mut self, message: Message) {
        let at = self.messages.partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(at, message);
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use roomsync_core::{Pagination, RoomKind, UserId};

    use super::*;

    fn message(room: &RoomKey, id: u32, at: i64) -> Message {
        Message {
            id: MessageId::new(format!("m{id}")),
            room_id: room.id.clone(),
            room_kind: room.kind,
            author_id: UserId::new("u1"),
            content: format!("message {id}"),
            created_at: DateTime::from_timestamp(at, 0).unwrap(),
        }
    }

    fn page(room: &RoomKey, range: std::ops::Range<u32>, has_more: bool) -> MessagePage {
        MessagePage {
            messages: range.map(|i| message(room, i, i64::from(i))).collect(),
            pagination: Pagination { has_more },
        }
    }

    fn loaded(room: &RoomKey, range: std::ops::Range<u32>, has_more: bool) -> MessageHistory {
        let mut history = MessageHistory::new(Ticket::new(room.clone(), 1));
        let request = history.load_initial().unwrap();
        history.apply_page(&request, Ok(page(room, range, has_more))).unwrap();
        history
    }

    fn ids(history: &MessageHistory) -> Vec<String> {
        history.messages().iter().map(|m| m.id.as_str().to_string()).collect()
    }

    #[test]
    fn initial_load_is_idempotent() {
        let room = RoomKey::community("main");
        let mut history = MessageHistory::new(Ticket::new(room, 1));
        let first = history.load_initial();
        assert!(matches!(first, Some(FetchRequest { page: 1, purpose: FetchPurpose::Initial, .. })));
        assert!(history.load_initial().is_none());
        assert!(history.is_loading());
    }

    #[test]
    fn initial_page_is_sorted_ascending() {
        let room = RoomKey::community("main");
        let mut history = MessageHistory::new(Ticket::new(room.clone(), 1));
        let request = history.load_initial().unwrap();

        let mut newest_first = page(&room, 0..5, true);
        newest_first.messages.reverse();
        let outcome = history.apply_page(&request, Ok(newest_first)).unwrap();

        assert_eq!(outcome, PageOutcome::Initial { added: 5 });
        assert_eq!(ids(&history), ["m0", "m1", "m2", "m3", "m4"]);
        assert!(history.has_more());
        assert_eq!(history.page(), 1);
    }

    #[test]
    fn initial_failure_settles_empty_without_more() {
        let room = RoomKey::community("main");
        let mut history = MessageHistory::new(Ticket::new(room, 1));
        let request = history.load_initial().unwrap();

        let result = history.apply_page(&request, Err(RequestError::Status(503)));
        assert!(matches!(result, Err(HistoryError::Fetch { page: 1, .. })));
        assert!(history.is_empty());
        assert!(!history.has_more());
        assert!(history.load_more().is_none());

        // Caller may re-trigger explicitly
        assert!(history.retry_initial().is_some());
    }

    #[test]
    fn load_more_prepends_older_page() {
        let room = RoomKey::clan("c1");
        let mut history = loaded(&room, 20..40, true);

        let request = history.load_more().unwrap();
        assert_eq!(request.page, 2);
        assert!(history.load_more().is_none(), "one older page at a time");

        let outcome = history.apply_page(&request, Ok(page(&room, 0..20, false))).unwrap();
        assert_eq!(outcome, PageOutcome::Prepended { added: 20 });
        assert_eq!(history.len(), 40);
        assert_eq!(history.messages()[0].id.as_str(), "m0");
        assert_eq!(history.page(), 2);
        assert!(!history.has_more());
        assert!(history.load_more().is_none());
    }

    #[test]
    fn load_more_requires_initial_load() {
        let room = RoomKey::clan("c1");
        let mut history = MessageHistory::new(Ticket::new(room, 1));
        assert!(history.load_more().is_none());
    }

    #[test]
    fn load_more_failure_keeps_cursor() {
        let room = RoomKey::clan("c1");
        let mut history = loaded(&room, 20..40, true);
        let request = history.load_more().unwrap();

        let result = history.apply_page(&request, Err(RequestError::Network("reset".into())));
        assert!(result.is_err());
        assert_eq!(history.page(), 1);
        assert!(history.has_more());

        // Retry from the same state asks for the same page
        assert_eq!(history.load_more().map(|r| r.page), Some(2));
    }

    #[test]
    fn prepend_filters_known_ids() {
        let room = RoomKey::clan("c1");
        let mut history = loaded(&room, 10..20, true);
        let request = history.load_more().unwrap();

        // Overlapping page (server shifted by new messages)
        let outcome = history.apply_page(&request, Ok(page(&room, 5..15, true))).unwrap();
        assert_eq!(outcome, PageOutcome::Prepended { added: 5 });
        assert_eq!(history.len(), 15);
        assert_eq!(history.messages()[0].id.as_str(), "m5");
    }

    #[test]
    fn pushed_message_is_appended_once() {
        let room = RoomKey::community("main");
        let mut history = loaded(&room, 0..3, false);

        assert_eq!(history.receive_pushed(message(&room, 3, 3)), PushOutcome::Appended);
        assert_eq!(history.receive_pushed(message(&room, 3, 3)), PushOutcome::Duplicate);
        assert_eq!(ids(&history), ["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn pushed_message_for_other_room_is_discarded() {
        let room = RoomKey::community("7");
        let mut history = loaded(&room, 0..3, false);

        let other_kind = RoomKey::new(RoomKind::Clan, "7");
        assert_eq!(history.receive_pushed(message(&other_kind, 9, 9)), PushOutcome::OtherRoom);
        assert_eq!(history.receive_pushed(message(&RoomKey::community("8"), 9, 9)), PushOutcome::OtherRoom);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn late_pushed_message_keeps_order() {
        let room = RoomKey::community("main");
        let mut history = loaded(&room, 0..3, false);
        let _ = history.receive_pushed(message(&room, 10, 10));

        let _ = history.receive_pushed(message(&room, 5, 5));
        assert_eq!(ids(&history), ["m0", "m1", "m2", "m5", "m10"]);
    }

    #[test]
    fn push_before_page_is_deduplicated() {
        let room = RoomKey::clan("c1");
        let mut history = loaded(&room, 20..40, true);
        let request = history.load_more().unwrap();

        // Page 2 races with a push of a message it also contains
        let _ = history.receive_pushed(message(&room, 19, 19));
        let outcome = history.apply_page(&request, Ok(page(&room, 0..20, false))).unwrap();

        assert_eq!(outcome, PageOutcome::Prepended { added: 19 });
        assert_eq!(history.len(), 40);
    }

    #[test]
    fn refresh_merges_new_messages() {
        let room = RoomKey::community("main");
        let mut history = loaded(&room, 0..5, true);

        let request = history.refresh().unwrap();
        assert!(history.refresh().is_none());

        let outcome = history.apply_page(&request, Ok(page(&room, 3..8, true))).unwrap();
        assert_eq!(outcome, PageOutcome::Merged { added: 3 });
        assert_eq!(history.len(), 8);
        assert_eq!(history.page(), 1, "refresh does not move the cursor");
        assert!(history.refresh().is_some());
    }

    #[test]
    fn stale_page_is_ignored() {
        let room_a = RoomKey::clan("a");
        let room_b = RoomKey::clan("b");
        let mut history = MessageHistory::new(Ticket::new(room_a.clone(), 1));
        let stale = history.load_initial().unwrap();

        history.reset(Ticket::new(room_b.clone(), 2));
        let fresh = history.load_initial().unwrap();

        assert_eq!(history.apply_page(&stale, Ok(page(&room_a, 0..20, true))), Ok(PageOutcome::Stale));
        assert!(history.is_empty());
        assert!(history.is_loading());

        let outcome = history.apply_page(&fresh, Ok(page(&room_b, 0..2, false))).unwrap();
        assert_eq!(outcome, PageOutcome::Initial { added: 2 });
    }

    #[test]
    fn reentering_same_room_invalidates_old_requests() {
        let room = RoomKey::clan("a");
        let mut history = MessageHistory::new(Ticket::new(room.clone(), 1));
        let stale = history.load_initial().unwrap();
        history.reset(Ticket::new(room.clone(), 2));

        assert_eq!(history.apply_page(&stale, Ok(page(&room, 0..3, false))), Ok(PageOutcome::Stale));
    }

    #[test]
    fn reset_clears_window() {
        let room = RoomKey::community("main");
        let mut history = loaded(&room, 0..5, true);
        history.reset(Ticket::new(RoomKey::community("other"), 2));

        assert!(history.is_empty());
        assert_eq!(history.page(), 0);
        assert!(!history.has_more());
        assert!(!history.is_initialized());
    }
}

//! Property-based tests for the message window and the scroll anchor.
//!
//! Pages and pushes arrive in arbitrary order with overlapping ids; the
//! window must stay deduplicated and ordered. Scroll restoration after a
//! prepend must be pixel exact for any heights.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use roomsync_client::{
    FetchPurpose, MessageHistory, PageOutcome, ScrollAnchor, ScrollBehavior, ScrollCommand,
    ScrollMetrics,
};
use roomsync_core::{Message, MessageId, MessagePage, Pagination, RoomKey, Ticket, UserId};

fn room() -> RoomKey {
    RoomKey::clan("7")
}

fn message(id: u16, at: u16) -> Message {
    let room = room();
    Message {
        id: MessageId::new(format!("m{id}")),
        room_id: room.id,
        room_kind: room.kind,
        author_id: UserId::new("u"),
        content: String::new(),
        created_at: Utc.timestamp_opt(1_700_000_000 + i64::from(at), 0).single().unwrap(),
    }
}

/// Messages whose timestamp is a function of the id, as the server assigns
/// them.
fn batch_strategy() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(0u16..60, 0..25)
        .prop_map(|ids| ids.into_iter().map(|id| message(id, id * 2)).collect())
}

fn page(messages: Vec<Message>, has_more: bool) -> MessagePage {
    MessagePage { messages, pagination: Pagination { has_more } }
}

fn assert_window(history: &MessageHistory) -> Result<(), TestCaseError> {
    let messages = history.messages();
    let ids: HashSet<_> = messages.iter().map(|m| m.id.clone()).collect();
    prop_assert_eq!(ids.len(), messages.len());
    prop_assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    Ok(())
}

proptest! {
    #[test]
    fn window_is_union_of_inputs(
        initial in batch_strategy(),
        older in batch_strategy(),
        pushes in batch_strategy(),
        refresh in batch_strategy(),
    ) {
        let mut history = MessageHistory::new(Ticket::new(room(), 1));
        let request = history.load_initial().unwrap();
        history.apply_page(&request, Ok(page(initial.clone(), true))).unwrap();

        for message in pushes.clone() {
            history.receive_pushed(message);
        }
        assert_window(&history)?;

        let request = history.load_more().unwrap();
        prop_assert_eq!(request.purpose, FetchPurpose::Older);
        history.apply_page(&request, Ok(page(older.clone(), false))).unwrap();
        assert_window(&history)?;

        let request = history.refresh().unwrap();
        history.apply_page(&request, Ok(page(refresh.clone(), false))).unwrap();
        assert_window(&history)?;

        let expected: HashSet<_> =
            [initial, older, pushes, refresh].into_iter().flatten().map(|m| m.id).collect();
        let actual: HashSet<_> = history.messages().iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn stale_pages_leave_window_untouched(batch in batch_strategy(), pushes in batch_strategy()) {
        let mut history = MessageHistory::new(Ticket::new(room(), 2));
        let mut stale = MessageHistory::new(Ticket::new(room(), 1));
        let stale_request = stale.load_initial().unwrap();
        history.load_initial().unwrap();

        for message in pushes {
            history.receive_pushed(message);
        }
        let before = history.messages().to_vec();

        let outcome = history.apply_page(&stale_request, Ok(page(batch, false))).unwrap();
        prop_assert_eq!(outcome, PageOutcome::Stale);
        prop_assert_eq!(history.messages(), before.as_slice());
        prop_assert!(!history.is_initialized());
    }

    #[test]
    fn prepend_restores_position_exactly(
        scroll_top in 0u32..400,
        height in 400u32..5000,
        grown in 0u32..5000,
        client in 100u32..400,
    ) {
        let (scroll_top, height, grown, client) =
            (f64::from(scroll_top), f64::from(height), f64::from(grown), f64::from(client));
        let mut anchor = ScrollAnchor::default();
        anchor.after_render(ScrollMetrics::new(0.0, height, client), 1);

        anchor.before_prepend(ScrollMetrics::new(scroll_top, height, client));
        let command = anchor.after_render(ScrollMetrics::new(scroll_top, height + grown, client), 2);

        prop_assert_eq!(
            command,
            Some(ScrollCommand::ScrollTo { top: scroll_top + grown, behavior: ScrollBehavior::Instant })
        );
    }

    #[test]
    fn append_follows_only_near_bottom(distance in 0u32..400, grown in 1u32..200) {
        let (distance, grown) = (f64::from(distance), f64::from(grown));
        let client = 300.0;
        let height = 2000.0;
        let top = height - client - distance;

        let mut anchor = ScrollAnchor::default();
        anchor.after_render(ScrollMetrics::new(0.0, height, client), 1);
        anchor.on_scroll(ScrollMetrics::new(top, height, client), true);

        anchor.before_append(ScrollMetrics::new(top, height, client));
        let after = ScrollMetrics::new(top, height + grown, client);
        let command = anchor.after_render(after, 2);

        if distance < 150.0 {
            prop_assert_eq!(
                command,
                Some(ScrollCommand::ScrollTo { top: after.bottom(), behavior: ScrollBehavior::Smooth })
            );
        } else {
            prop_assert_eq!(command, None);
        }
    }
}

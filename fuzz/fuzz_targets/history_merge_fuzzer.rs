//! Fuzz target for the message window merge logic
//!
//! Drives a [`MessageHistory`] with arbitrary pushes and page responses,
//! including foreign rooms, repeated ids, shuffled timestamps and responses
//! for a stale ticket.
//!
//! # Invariants
//!
//! - No message id appears twice
//! - Messages ascend by `created_at`
//! - Every message belongs to the window's room
//! - Stale responses never change the window

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use chrono::{DateTime, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use roomsync_client::{FetchPurpose, FetchRequest, MessageHistory};
use roomsync_core::{Message, MessageId, MessagePage, Pagination, RoomKey, Ticket, UserId};

#[derive(Debug, Clone, Arbitrary)]
struct FuzzMessage {
    id: u8,
    /// Seconds after the base timestamp. Few values so ties happen.
    at: u8,
    foreign: bool,
}

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Push(FuzzMessage),
    LoadMore,
    Refresh,
    Answer { purpose: u8, page: Vec<FuzzMessage>, has_more: bool, fail: bool },
    StaleAnswer(Vec<FuzzMessage>),
}

fn room() -> RoomKey {
    RoomKey::community("fuzz")
}

fn timestamp(at: u8) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + i64::from(at % 32), 0).single().unwrap()
}

fn build(input: &FuzzMessage) -> Message {
    let room = if input.foreign { RoomKey::clan("fuzz") } else { room() };
    Message {
        id: MessageId::new(format!("m{}", input.id)),
        room_id: room.id.clone(),
        room_kind: room.kind,
        author_id: UserId::new("fuzzer"),
        content: String::new(),
        created_at: timestamp(input.at),
    }
}

fn page(messages: &[FuzzMessage], has_more: bool) -> MessagePage {
    MessagePage { messages: messages.iter().map(build).collect(), pagination: Pagination { has_more } }
}

fn check(history: &MessageHistory) {
    let messages = history.messages();
    let ids: HashSet<_> = messages.iter().map(|m| &m.id).collect();
    assert_eq!(ids.len(), messages.len(), "duplicate id in window");
    assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at), "window out of order");
    assert!(messages.iter().all(|m| m.belongs_to(&room())), "foreign message in window");
}

fuzz_target!(|steps: Vec<Step>| {
    let ticket = Ticket::new(room(), 2);
    let stale = Ticket::new(room(), 1);
    let mut history = MessageHistory::new(ticket.clone());
    let mut pending: Vec<FetchRequest> = history.load_initial().into_iter().collect();

    for step in steps {
        match step {
            Step::Push(message) => {
                history.receive_pushed(build(&message));
            },
            Step::LoadMore => pending.extend(history.load_more()),
            Step::Refresh => pending.extend(history.refresh()),
            Step::Answer { purpose, page: messages, has_more, fail } => {
                let wanted = match purpose % 3 {
                    0 => FetchPurpose::Initial,
                    1 => FetchPurpose::Older,
                    _ => FetchPurpose::Refresh,
                };
                let Some(index) = pending.iter().position(|r| r.purpose == wanted) else {
                    continue;
                };
                let request = pending.remove(index);
                let result = if fail {
                    Err(roomsync_core::RequestError::Status(503))
                } else {
                    Ok(page(&messages, has_more))
                };
                let _ = history.apply_page(&request, result);
                if fail {
                    pending.extend(history.retry_initial());
                }
            },
            Step::StaleAnswer(messages) => {
                let before = history.messages().to_vec();
                let request = FetchRequest { ticket: stale.clone(), page: 1, purpose: FetchPurpose::Refresh };
                let _ = history.apply_page(&request, Ok(page(&messages, true)));
                assert_eq!(before, history.messages(), "stale page changed the window");
            },
        }
        check(&history);
    }
});

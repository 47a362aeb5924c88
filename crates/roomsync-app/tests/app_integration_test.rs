//! Integration tests for App behavior.
//!
//! Tests feed the App the completions a driver would report and check the
//! actions it asks for.
//!
//! # Oracle Pattern
//!
//! Tests end with oracle checks that verify:
//! - Channel commands respect membership decisions
//! - The message window only holds the active room's messages
//! - Viewport commands keep the reading position

use std::time::Duration;

use chrono::{TimeZone, Utc};
use roomsync_app::{App, AppAction, AppEvent, SyncConfig};
use roomsync_client::{
    ChannelCommand, FetchPurpose, FetchRequest, MembershipCheck, MembershipDecision,
    ScrollBehavior, ScrollMetrics, SendError,
};
use roomsync_core::{
    DenialCode, Identity, Message, MessageId, MessagePage, Pagination, RequestError, RoomKey,
    UserId, wire::ServerFrame,
};

type TestApp = App<Duration>;

fn user() -> UserId {
    UserId::new("me")
}

/// Create a connected App ready for testing.
fn connected_app() -> TestApp {
    let mut app = TestApp::new(Identity::authenticated(user(), "tok"), SyncConfig::default());
    app.connect();
    app.handle(AppEvent::ChannelOpened);
    app
}

fn message(room: &RoomKey, seq: i64) -> Message {
    Message {
        id: MessageId::new(format!("{}-{seq}", room.id.as_str())),
        room_id: room.id.clone(),
        room_kind: room.kind,
        author_id: UserId::new("other"),
        content: format!("message {seq}"),
        created_at: Utc.timestamp_opt(1_700_000_000 + seq, 0).single().unwrap(),
    }
}

/// Page of `seq` range, newest first as the server lists it.
fn page(room: &RoomKey, seqs: std::ops::RangeInclusive<i64>, has_more: bool) -> MessagePage {
    MessagePage {
        messages: seqs.rev().map(|s| message(room, s)).collect(),
        pagination: Pagination { has_more },
    }
}

fn fetches(actions: &[AppAction]) -> Vec<FetchRequest> {
    actions
        .iter()
        .filter_map(|a| match a {
            AppAction::FetchPage(request) => Some(request.clone()),
            _ => None,
        })
        .collect()
}

fn checks(actions: &[AppAction]) -> Vec<MembershipCheck> {
    actions
        .iter()
        .filter_map(|a| match a {
            AppAction::CheckMembership(check) => Some(check.clone()),
            _ => None,
        })
        .collect()
}

fn commands(actions: &[AppAction]) -> Vec<ChannelCommand> {
    actions
        .iter()
        .filter_map(|a| match a {
            AppAction::Channel(command) => Some(command.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn clan_non_member_never_joins() {
    let mut app = connected_app();
    let clan = RoomKey::clan("42");
    let actions = app.open_room(clan.clone());

    let [check] = checks(&actions).try_into().unwrap();
    assert_eq!(check.user_id, user());
    assert_eq!(check.clan_id.as_str(), "42");
    assert!(commands(&actions).is_empty());

    let actions = app.handle(AppEvent::MembershipChecked { ticket: check.ticket, result: Ok(false) });
    assert!(commands(&actions).is_empty());
    assert!(fetches(&actions).is_empty());
    assert_eq!(
        app.session().unwrap().decision(),
        MembershipDecision::Denied(DenialCode::NotMember)
    );

    assert_eq!(app.send_message("hi"), Err(SendError::NotJoined { room: clan }));
}

#[test]
fn clan_member_joins_then_loads() {
    let mut app = connected_app();
    let clan = RoomKey::clan("42");
    let actions = app.open_room(clan.clone());
    let [check] = checks(&actions).try_into().unwrap();

    let actions = app.handle(AppEvent::MembershipChecked { ticket: check.ticket, result: Ok(true) });
    assert_eq!(commands(&actions), vec![ChannelCommand::Join(clan)]);
    let [request] = fetches(&actions).try_into().unwrap();
    assert_eq!(request.purpose, FetchPurpose::Initial);
}

#[test]
fn membership_result_after_switch_is_discarded() {
    let mut app = connected_app();
    let actions = app.open_room(RoomKey::clan("a"));
    let [stale] = checks(&actions).try_into().unwrap();
    app.open_room(RoomKey::community("b"));

    let actions = app.handle(AppEvent::MembershipChecked { ticket: stale.ticket, result: Ok(true) });
    assert!(actions.is_empty());
    assert_eq!(app.active_room(), Some(&RoomKey::community("b")));
}

#[test]
fn pagination_keeps_reading_position() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let actions = app.open_room(room.clone());
    let [initial] = fetches(&actions).try_into().unwrap();

    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 21..=40, true)) });
    let actions = app.handle(AppEvent::Rendered(ScrollMetrics::new(0.0, 600.0, 300.0)));
    assert_eq!(actions, vec![AppAction::ScrollTo { top: 300.0, behavior: ScrollBehavior::Instant }]);

    let actions = app.handle(AppEvent::Scrolled(ScrollMetrics::new(0.0, 600.0, 300.0)));
    let [older] = fetches(&actions).try_into().unwrap();
    assert_eq!((older.page, older.purpose), (2, FetchPurpose::Older));

    // Reaching the top again while the page is in flight does nothing.
    assert!(app.handle(AppEvent::Scrolled(ScrollMetrics::new(0.0, 600.0, 300.0))).is_empty());

    app.handle(AppEvent::PageLoaded { request: older, result: Ok(page(&room, 1..=20, false)) });
    let actions = app.handle(AppEvent::Rendered(ScrollMetrics::new(0.0, 1200.0, 300.0)));
    assert_eq!(actions, vec![AppAction::ScrollTo { top: 600.0, behavior: ScrollBehavior::Instant }]);

    let session = app.session().unwrap();
    assert_eq!(session.messages().len(), 40);
    assert!(!session.history().can_load_more());
    assert!(session.messages().windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[test]
fn failed_older_page_notice_says_whether_to_retry() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();
    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 21..=40, true)) });
    app.handle(AppEvent::Rendered(ScrollMetrics::new(0.0, 600.0, 300.0)));

    let top = ScrollMetrics::new(0.0, 600.0, 300.0);
    let [older] = fetches(&app.handle(AppEvent::Scrolled(top))).try_into().unwrap();
    app.handle(AppEvent::PageLoaded { request: older, result: Err(RequestError::Status(503)) });
    assert_eq!(
        app.status_message(),
        Some("failed to load page 2 of community:c: server returned status 503, try again")
    );

    let [older] = fetches(&app.handle(AppEvent::Scrolled(top))).try_into().unwrap();
    assert_eq!(older.page, 2);
    app.handle(AppEvent::PageLoaded { request: older, result: Err(RequestError::Status(404)) });
    assert_eq!(
        app.status_message(),
        Some("failed to load page 2 of community:c: server returned status 404")
    );
    assert_eq!(app.session().unwrap().messages().len(), 20);
}

#[test]
fn push_to_active_room_scrolls_when_near_bottom() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();
    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 1..=20, false)) });
    app.handle(AppEvent::Rendered(ScrollMetrics::new(0.0, 600.0, 300.0)));

    let actions = app.handle(AppEvent::Frame(ServerFrame::Message { message: message(&room, 21) }));
    assert_eq!(actions, vec![AppAction::Render]);
    let actions = app.handle(AppEvent::Rendered(ScrollMetrics::new(300.0, 630.0, 300.0)));
    assert_eq!(actions, vec![AppAction::ScrollTo { top: 330.0, behavior: ScrollBehavior::Smooth }]);
}

#[test]
fn first_page_after_push_keeps_viewport_anchored() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();

    // The push beats page 1 and is rendered on its own.
    app.handle(AppEvent::Frame(ServerFrame::Message { message: message(&room, 41) }));
    let actions = app.handle(AppEvent::Rendered(ScrollMetrics::new(0.0, 30.0, 20.0)));
    assert_eq!(actions, vec![AppAction::ScrollTo { top: 10.0, behavior: ScrollBehavior::Instant }]);

    let actions =
        app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 21..=40, true)) });
    assert_eq!(actions, vec![AppAction::Render]);
    let actions = app.handle(AppEvent::Rendered(ScrollMetrics::new(10.0, 630.0, 20.0)));
    assert_eq!(actions, vec![AppAction::ScrollTo { top: 610.0, behavior: ScrollBehavior::Instant }]);

    let session = app.session().unwrap();
    assert_eq!(session.messages().len(), 21);
    assert_eq!(session.messages().last().map(|m| m.id.as_str()), Some("c-41"));
}

#[test]
fn push_to_other_room_is_ignored() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();
    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 1..=3, false)) });

    let elsewhere = RoomKey::clan("c");
    let actions = app.handle(AppEvent::Frame(ServerFrame::Message { message: message(&elsewhere, 4) }));
    assert!(actions.is_empty());
    assert_eq!(app.session().unwrap().messages().len(), 3);
}

#[test]
fn duplicate_delivery_is_merged() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();

    app.handle(AppEvent::Frame(ServerFrame::Message { message: message(&room, 5) }));
    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 1..=5, false)) });
    app.handle(AppEvent::Frame(ServerFrame::Message { message: message(&room, 5) }));

    let ids: Vec<_> =
        app.session().unwrap().messages().iter().map(|m| m.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["c-1", "c-2", "c-3", "c-4", "c-5"]);
}

#[test]
fn send_then_refresh_merges_authoritative_copy() {
    let mut app = connected_app();
    let room = RoomKey::community("c");
    let [initial] = fetches(&app.open_room(room.clone())).try_into().unwrap();
    app.handle(AppEvent::PageLoaded { request: initial, result: Ok(page(&room, 1..=2, false)) });

    let actions = app.send_message("gg").unwrap();
    assert_eq!(commands(&actions), vec![ChannelCommand::Send { room: room.clone(), content: "gg".into() }]);
    let [refresh] = fetches(&actions).try_into().unwrap();
    assert_eq!((refresh.page, refresh.purpose), (1, FetchPurpose::Refresh));

    let actions = app.handle(AppEvent::PageLoaded { request: refresh, result: Ok(page(&room, 1..=3, false)) });
    assert_eq!(actions, vec![AppAction::Render]);
    assert_eq!(app.session().unwrap().messages().len(), 3);
    assert_eq!(app.session().unwrap().history().page(), 1);
}

#[test]
fn unauthenticated_app_cannot_join_anything() {
    let mut app = TestApp::new(Identity::anonymous(), SyncConfig::default());
    let actions = app.connect();
    assert!(matches!(actions[0], AppAction::Notify { .. }));

    let actions = app.open_room(RoomKey::community("c"));
    assert!(commands(&actions).is_empty());
    assert_eq!(app.send_message("hi"), Err(SendError::NotJoined { room: RoomKey::community("c") }));
}

//! End-to-end scenarios through the production Runtime and the simulation
//! driver.
//!
//! # Oracle Pattern
//!
//! Every scenario runs with the standard invariant registry enabled, so each
//! processed event is also checked for duplicates, ordering, stale rooms and
//! join/leave symmetry. Tests end with oracle checks on:
//! - the channel commands the server received
//! - the message window and viewport the user sees

use std::time::Duration;

use roomsync_app::{App, AppEvent, Runtime, SyncConfig};
use roomsync_client::{ChannelCommand, MembershipDecision, ReconnectPolicy, ScrollBehavior};
use roomsync_core::{DenialCode, Identity, RoomKey, wire::ServerFrame};
use roomsync_harness::{
    ChannelEvent, Delivery, PAGE_SIZE, SimDriver, Simulation,
    operation::{other_user, sim_user},
    sim_driver::ROW_HEIGHT,
};

fn lobby() -> RoomKey {
    RoomKey::community("lobby")
}

fn trade() -> RoomKey {
    RoomKey::community("trade")
}

async fn started(delivery: Delivery, seeded: usize) -> Simulation {
    let mut sim = Simulation::standard(delivery, seeded);
    sim.start().await.unwrap();
    assert!(sim.driver().is_connected());
    sim
}

async fn in_lobby(seeded: usize) -> Simulation {
    let mut sim = started(Delivery::Immediate, seeded).await;
    sim.dispatch(AppEvent::OpenRoom(lobby())).await.unwrap();
    sim
}

fn window_ids(sim: &Simulation) -> Vec<String> {
    sim.snapshot().message_ids().into_iter().map(String::from).collect()
}

#[tokio::test]
async fn clan_non_member_is_denied_without_join() {
    let mut sim = started(Delivery::Immediate, 5).await;
    sim.dispatch(AppEvent::OpenRoom(RoomKey::clan("rival"))).await.unwrap();

    let session = sim.app().session().unwrap();
    assert_eq!(session.decision(), MembershipDecision::Denied(DenialCode::NotMember));
    assert!(session.messages().is_empty());
    assert!(sim.driver().commands().is_empty());
    assert_eq!(sim.driver().notices(), vec!["Request to join to chat in this room".to_string()]);

    sim.dispatch(AppEvent::Send { content: "let me in".into() }).await.unwrap();
    assert!(sim.driver().commands().is_empty());
    assert_eq!(sim.app().status_message(), Some("room clan:rival is not joined"));
}

#[tokio::test]
async fn clan_member_joins_and_loads_history() {
    let mut sim = started(Delivery::Immediate, 5).await;
    let guild = RoomKey::clan("guild");
    sim.dispatch(AppEvent::OpenRoom(guild.clone())).await.unwrap();

    assert_eq!(sim.driver().commands(), vec![ChannelCommand::Join(guild)]);
    assert_eq!(sim.app().session().unwrap().messages().len(), 5);
}

#[tokio::test]
async fn failed_membership_check_is_retryable_denial() {
    let mut sim = started(Delivery::Immediate, 5).await;
    sim.driver().set_fail_membership(true);
    sim.dispatch(AppEvent::OpenRoom(RoomKey::clan("guild"))).await.unwrap();

    assert_eq!(
        sim.app().session().unwrap().decision(),
        MembershipDecision::Denied(DenialCode::MembershipCheckFailed)
    );
    assert!(sim.driver().commands().is_empty());
}

#[tokio::test]
async fn twenty_plus_twenty_keeps_viewport_anchored() {
    let mut sim = in_lobby(2 * PAGE_SIZE).await;

    assert_eq!(sim.app().session().unwrap().messages().len(), PAGE_SIZE);
    assert_eq!(sim.driver().scrolls(), vec![(300.0, ScrollBehavior::Instant)]);

    let first_visible = window_ids(&sim)[0].clone();
    sim.driver().scroll_user(0.0);
    sim.settle().await.unwrap();

    let session = sim.app().session().unwrap();
    assert_eq!(session.messages().len(), 2 * PAGE_SIZE);
    assert!(!session.history().has_more());
    assert_eq!(session.history().page(), 2);
    assert_eq!(sim.driver().scrolls().last(), Some(&(600.0, ScrollBehavior::Instant)));

    // The row that was at the top before the prepend is still at the top.
    let ids = window_ids(&sim);
    let row = ids.iter().position(|id| *id == first_visible).unwrap();
    assert_eq!(row as f64 * ROW_HEIGHT, sim.driver().viewport().scroll_top);
    assert_eq!(ids.first().map(String::as_str), Some("m1"));
    assert_eq!(ids.last().map(String::as_str), Some("m40"));

    sim.driver().scroll_user(0.0);
    sim.settle().await.unwrap();
    assert_eq!(sim.app().session().unwrap().history().page(), 2);
}

#[tokio::test]
async fn push_to_active_room_follows_bottom() {
    let mut sim = in_lobby(PAGE_SIZE).await;

    sim.driver().publish(&lobby(), &other_user(), "fresh");
    sim.settle().await.unwrap();

    assert_eq!(sim.app().session().unwrap().messages().len(), PAGE_SIZE + 1);
    assert_eq!(sim.driver().scrolls().last(), Some(&(330.0, ScrollBehavior::Smooth)));
}

#[tokio::test]
async fn push_for_other_room_is_discarded() {
    let mut sim = in_lobby(PAGE_SIZE).await;
    let stray = sim.driver().server(|s| s.messages(&trade()).last().cloned()).unwrap();
    let scrolls = sim.driver().scrolls().len();

    sim.dispatch(AppEvent::Frame(ServerFrame::Message { message: stray })).await.unwrap();

    assert_eq!(sim.app().session().unwrap().messages().len(), PAGE_SIZE);
    assert_eq!(sim.driver().scrolls().len(), scrolls);
}

#[tokio::test]
async fn push_while_scrolled_up_keeps_position() {
    let mut sim = in_lobby(PAGE_SIZE).await;
    sim.driver().scroll_user(0.0);
    sim.settle().await.unwrap();
    let scrolls = sim.driver().scrolls().len();

    sim.driver().publish(&lobby(), &other_user(), "while reading");
    sim.settle().await.unwrap();

    assert_eq!(sim.app().session().unwrap().messages().len(), PAGE_SIZE + 1);
    assert_eq!(sim.driver().scrolls().len(), scrolls);
    assert_eq!(sim.driver().viewport().scroll_top, 0.0);
}

#[tokio::test]
async fn push_within_threshold_follows() {
    let mut sim = in_lobby(PAGE_SIZE).await;
    // 20 rows: bottom at 300, so 151 is 149 px away from it.
    sim.driver().scroll_user(151.0);
    sim.settle().await.unwrap();

    sim.driver().publish(&lobby(), &other_user(), "close enough");
    sim.settle().await.unwrap();
    assert_eq!(sim.driver().scrolls().last(), Some(&(330.0, ScrollBehavior::Smooth)));
}

#[tokio::test]
async fn switching_rooms_discards_late_pages() {
    let mut sim = started(Delivery::Held, 5).await;
    sim.dispatch(AppEvent::OpenRoom(lobby())).await.unwrap();
    sim.dispatch(AppEvent::OpenRoom(trade())).await.unwrap();
    assert_eq!(sim.driver().held_pages(), 2);

    sim.driver().release();
    sim.settle().await.unwrap();

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.active_room.as_deref(), Some("community:trade"));
    assert_eq!(snapshot.messages.len(), 5);
    assert!(snapshot.messages.iter().all(|m| m.room == "community:trade"));
    assert_eq!(
        sim.driver().commands(),
        vec![
            ChannelCommand::Join(lobby()),
            ChannelCommand::Leave(lobby()),
            ChannelCommand::Join(trade()),
        ]
    );
}

#[tokio::test]
async fn returning_to_a_room_ignores_its_earlier_activation() {
    let mut sim = started(Delivery::Held, 5).await;
    for room in [lobby(), trade(), lobby()] {
        sim.dispatch(AppEvent::OpenRoom(room)).await.unwrap();
    }
    assert_eq!(sim.app().generation(), 3);

    sim.driver().release_shuffled(7);
    sim.settle().await.unwrap();

    let session = sim.app().session().unwrap();
    assert_eq!(session.ticket().generation, 3);
    assert_eq!(session.messages().len(), 5);
    assert!(session.history().is_initialized());
}

#[tokio::test]
async fn revoked_access_leaves_and_blocks_send() {
    let mut sim = started(Delivery::Immediate, 5).await;
    let guild = RoomKey::clan("guild");
    sim.dispatch(AppEvent::OpenRoom(guild.clone())).await.unwrap();

    sim.driver().revoke(&guild, DenialCode::ClanBanned);
    sim.settle().await.unwrap();

    assert_eq!(
        sim.app().session().unwrap().decision(),
        MembershipDecision::Denied(DenialCode::ClanBanned)
    );
    assert_eq!(sim.app().status_message(), Some("You are banned from this room"));

    sim.dispatch(AppEvent::Send { content: "hello?".into() }).await.unwrap();
    assert_eq!(
        sim.driver().commands(),
        vec![ChannelCommand::Join(guild.clone()), ChannelCommand::Leave(guild)]
    );
}

#[tokio::test]
async fn sent_message_appears_once() {
    let mut sim = in_lobby(5).await;
    sim.dispatch(AppEvent::Send { content: "  hello  ".into() }).await.unwrap();

    assert_eq!(
        sim.driver().commands().last(),
        Some(&ChannelCommand::Send { room: lobby(), content: "hello".into() })
    );
    let session = sim.app().session().unwrap();
    let mine: Vec<_> = session.messages().iter().filter(|m| m.author_id == sim_user()).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].content, "hello");
    assert_eq!(session.messages().len(), 6);
}

#[tokio::test]
async fn blank_message_is_rejected_locally() {
    let mut sim = in_lobby(5).await;
    sim.dispatch(AppEvent::Send { content: " \n ".into() }).await.unwrap();

    assert_eq!(sim.driver().commands(), vec![ChannelCommand::Join(lobby())]);
    assert_eq!(sim.app().status_message(), Some("message is empty"));
}

#[tokio::test]
async fn failed_emission_is_surfaced_without_mutation() {
    let mut sim = in_lobby(5).await;
    sim.driver().set_fail_sends(true);
    sim.dispatch(AppEvent::Send { content: "lost".into() }).await.unwrap();

    let session = sim.app().session().unwrap();
    assert!(session.last_send_failure().is_some());
    assert_eq!(session.messages().len(), 5);
    assert!(sim.driver().notices().last().unwrap().starts_with("failed to send message to community:lobby"));
}

#[tokio::test]
async fn failed_initial_load_waits_for_retry() {
    let mut sim = started(Delivery::Immediate, 30).await;
    sim.driver().set_fail_pages(true);
    sim.dispatch(AppEvent::OpenRoom(lobby())).await.unwrap();

    let history = sim.app().session().unwrap().history();
    assert!(history.is_initialized());
    assert!(!history.has_more());
    assert!(history.is_empty());

    sim.driver().set_fail_pages(false);
    sim.dispatch(AppEvent::RetryHistory).await.unwrap();
    let history = sim.app().session().unwrap().history();
    assert_eq!(history.len(), PAGE_SIZE);
    assert!(history.has_more());
}

#[tokio::test]
async fn dropped_channel_stays_down_without_policy() {
    let mut sim = in_lobby(5).await;
    sim.driver().drop_channel("server restart");
    sim.settle().await.unwrap();
    sim.driver().advance(Duration::from_secs(60));
    sim.settle().await.unwrap();

    assert!(!sim.app().is_connected());
    assert!(!sim.app().session().unwrap().membership().is_joined());
    assert_eq!(sim.app().status_message(), Some("Disconnected: server restart"));

    sim.dispatch(AppEvent::Connect).await.unwrap();
    assert!(sim.app().session().unwrap().membership().is_joined());
}

#[tokio::test]
async fn backoff_policy_reconnects_and_rejoins() {
    let config = SyncConfig {
        reconnect: ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(8),
            max_attempts: 3,
        },
        ..SyncConfig::default()
    };
    let mut sim = Simulation::new(Identity::authenticated(sim_user(), "t"), config, Delivery::Immediate);
    sim.driver().server(|s| s.seed(&lobby(), &other_user(), 3));
    sim.start().await.unwrap();
    sim.dispatch(AppEvent::OpenRoom(lobby())).await.unwrap();

    sim.driver().drop_channel("idle timeout");
    sim.settle().await.unwrap();
    sim.driver().publish(&lobby(), &other_user(), "missed while away");
    sim.driver().advance(Duration::from_secs(1));
    sim.settle().await.unwrap();

    assert!(sim.app().is_connected());
    let log = sim.driver().channel_log();
    assert_eq!(
        log,
        vec![
            ChannelEvent::Opened,
            ChannelEvent::Command(ChannelCommand::Join(lobby())),
            ChannelEvent::Closed,
            ChannelEvent::Opened,
            ChannelEvent::Command(ChannelCommand::Join(lobby())),
        ]
    );
    // The re-join refresh picks up what was pushed while disconnected.
    assert_eq!(sim.app().session().unwrap().messages().len(), 4);
}

#[tokio::test]
async fn sign_out_closes_channel() {
    let mut sim = in_lobby(5).await;
    sim.dispatch(AppEvent::IdentityChanged(Identity::anonymous())).await.unwrap();

    assert!(!sim.driver().is_connected());
    assert!(!sim.app().is_connected());
}

#[tokio::test]
async fn runtime_run_quits_after_leaving() {
    let driver = SimDriver::new(sim_user());
    driver.server(|s| s.seed(&lobby(), &other_user(), 3));
    driver.inject_event(AppEvent::OpenRoom(lobby()));
    driver.inject_event(AppEvent::Quit);

    let app = App::new(Identity::authenticated(sim_user(), "t"), SyncConfig::default());
    let app = Runtime::new(driver, app).run().await.unwrap();

    assert!(app.active_room().is_none());
    assert!(!app.is_connected());
}

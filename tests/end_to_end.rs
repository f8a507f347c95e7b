//! Host and clients driven together in one process.

use std::sync::Arc;
use std::time::Duration;

use duel_session::state::{Capacity, GameError, Score, SessionSnapshot, SessionStatus};
use duel_session::sync::{LobbyAction, LinkStatus};
use duel_session::{
    DuelClient, HostConfig, SeatReleasePolicy, SessionHost, SyncConfig, SyncError, SyncEvent,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn client(host: &Arc<SessionHost>, user: &str) -> DuelClient {
    let config = SyncConfig::new().with_resubscribe_backoff(Duration::from_millis(5));
    DuelClient::new(user, host.clone(), host.clone()).with_config(config)
}

/// Wait for the first event matching `pred`, skipping the rest.
async fn wait_for(
    events: &mut mpsc::Receiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Wait until the client's cached snapshot satisfies `pred`.
async fn wait_until(
    client: &DuelClient,
    session_id: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(snap) = client.current(session_id).await {
                if pred(&snap) {
                    return snap;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

#[tokio::test]
async fn test_two_player_duel_first_joiner_wins() {
    let host = Arc::new(SessionHost::new());
    let alice = client(&host, "alice");
    let bob = client(&host, "bob");

    let created = alice.create(Capacity::Two).await.unwrap();
    let id = created.id.clone();
    let (alice_sync, mut alice_events) = alice.subscribe(&id);

    bob.join(&id).await.unwrap();
    let (bob_sync, _bob_events) = bob.subscribe(&id);

    alice.set_secret(&id, "1234").await.unwrap();
    bob.set_secret(&id, "5678").await.unwrap();

    // bob's secret started the game; alice hears about it through a push
    let event = wait_for(&mut alice_events, |e| {
        matches!(e, SyncEvent::Snapshot(s) if s.status == SessionStatus::Active)
    })
    .await;
    let SyncEvent::Snapshot(active) = event else {
        unreachable!()
    };
    assert_eq!(active.turn_holder.as_deref(), Some("alice"));
    assert!(active.is_turn_of("alice"));
    assert_eq!(active.target_of("alice").unwrap().user_id, "bob");
    assert_eq!(active.player("alice").unwrap().secret.as_deref(), Some("1234"));
    assert_eq!(active.player("bob").unwrap().secret, None);

    assert_eq!(
        bob.guess(&id, "1234").await,
        Err(SyncError::Rejected(GameError::NotYourTurn))
    );

    let done = alice.guess(&id, "5678").await.unwrap();
    assert_eq!(done.status, SessionStatus::Finished);
    assert_eq!(done.winner.as_deref(), Some("alice"));
    assert_eq!(done.runner_up.as_deref(), Some("bob"));
    let last = done.player("alice").unwrap().guess_log.last().unwrap();
    assert_eq!(last.score(), Score { dead: 4, wounded: 0 });

    let seen_by_bob = wait_until(&bob, &id, |s| s.status == SessionStatus::Finished).await;
    assert_eq!(seen_by_bob.winner.as_deref(), Some("alice"));
    assert_eq!(seen_by_bob.standings(), vec!["alice", "bob"]);

    alice_sync.leave().await;
    bob_sync.leave().await;
    assert!(alice.current(&id).await.is_none());
    assert_eq!(host.subscriber_count(&id).await, 0);
}

#[tokio::test]
async fn test_alternation_until_a_win() {
    let host = Arc::new(SessionHost::new());
    let alice = client(&host, "alice");
    let bob = client(&host, "bob");

    let id = alice.create(Capacity::Two).await.unwrap().id;
    bob.join(&id).await.unwrap();
    alice.set_secret(&id, "1234").await.unwrap();
    bob.set_secret(&id, "5678").await.unwrap();

    let a1 = alice.guess(&id, "5600").await.unwrap();
    assert_eq!(a1.turn_holder.as_deref(), Some("bob"));
    let b1 = bob.guess(&id, "4321").await.unwrap();
    assert_eq!(b1.turn_holder.as_deref(), Some("alice"));
    let b1_score = b1.player("bob").unwrap().guess_log[0].score();
    assert_eq!(b1_score, Score { dead: 0, wounded: 4 });

    alice.guess(&id, "5687").await.unwrap();
    let done = bob.guess(&id, "1234").await.unwrap();
    assert_eq!(done.status, SessionStatus::Finished);
    assert_eq!(done.winner.as_deref(), Some("bob"));
    assert_eq!(done.player("alice").unwrap().best_dead_score, 2);
}

#[tokio::test]
async fn test_resyncs_after_connection_loss() {
    let host = Arc::new(SessionHost::new());
    let alice = client(&host, "alice");
    let bob = client(&host, "bob");

    let id = alice.create(Capacity::Two).await.unwrap().id;
    let (alice_sync, mut events) = alice.subscribe(&id);
    wait_for(&mut events, |e| matches!(e, SyncEvent::Snapshot(_))).await;
    assert_eq!(alice_sync.link_status().await, Some(LinkStatus::Live));

    assert_eq!(host.close_subscriptions(&id).await, Ok(1));
    wait_for(&mut events, |e| matches!(e, SyncEvent::Reconnecting { .. })).await;

    // the loop resubscribes on its own and pushes flow again
    tokio::time::timeout(Duration::from_secs(5), async {
        while host.subscriber_count(&id).await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("never resubscribed");

    bob.join(&id).await.unwrap();
    let snap = wait_until(&alice, &id, |s| s.has_player("bob")).await;
    assert!(!snap.is_joinable());
    assert!(alice_sync.link_status().await.unwrap().is_live());

    let entry = alice.store().entry(&id).await.unwrap();
    assert_eq!(entry.link.resyncs, 1);

    alice_sync.leave().await;
}

#[tokio::test]
async fn test_unknown_session_is_unavailable() {
    let host = Arc::new(SessionHost::new());
    let alice = client(&host, "alice");

    let (sync, mut events) = alice.subscribe("missing");
    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::Unavailable { .. })).await;
    assert_eq!(event, SyncEvent::Unavailable { attempts: 1 });
    assert!(sync.current().await.is_none());
    sync.leave().await;
}

#[tokio::test]
async fn test_three_player_elimination() {
    let host = Arc::new(SessionHost::new());
    let a = client(&host, "a");
    let b = client(&host, "b");
    let c = client(&host, "c");

    let id = a.create(Capacity::Three).await.unwrap().id;
    b.join(&id).await.unwrap();
    c.join(&id).await.unwrap();
    assert_eq!(
        client(&host, "d").join(&id).await,
        Err(SyncError::Rejected(GameError::SessionFull))
    );

    a.set_secret(&id, "1234").await.unwrap();
    b.set_secret(&id, "5678").await.unwrap();
    let active = c.set_secret(&id, "9012").await.unwrap();
    assert_eq!(active.status, SessionStatus::Active);
    assert_eq!(active.target_of("a").unwrap().user_id, "b");
    assert_eq!(active.target_of("b").unwrap().user_id, "c");
    assert_eq!(active.target_of("c").unwrap().user_id, "a");

    // a cracks b, b drops out of the rotation and a inherits c as target
    let after = a.guess(&id, "5678").await.unwrap();
    assert_eq!(after.status, SessionStatus::Active);
    assert!(after.player("b").unwrap().eliminated);
    assert_eq!(after.turn_holder.as_deref(), Some("c"));
    assert_eq!(after.target_of("a").unwrap().user_id, "c");
    assert_eq!(
        b.guess(&id, "9012").await,
        Err(SyncError::Rejected(GameError::NotYourTurn))
    );

    let done = c.guess(&id, "1234").await.unwrap();
    assert_eq!(done.status, SessionStatus::Finished);
    assert_eq!(done.standings(), vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_lobby_lists_waiting_sessions() {
    let host = Arc::new(SessionHost::new());
    let alice = client(&host, "alice");
    let bob = client(&host, "bob");

    let mut lobby = bob.lobby();
    assert!(lobby.refresh().await.unwrap().is_empty());

    let s = alice.create(Capacity::Two).await.unwrap();
    let entries = lobby.refresh().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, LobbyAction::Join);

    lobby.join(&s.id).await.unwrap();
    lobby.refresh().await.unwrap();
    assert_eq!(lobby.entry(&s.id).unwrap().action, LobbyAction::Resume);

    let carol_entries = client(&host, "carol").lobby().refresh().await.unwrap().to_vec();
    assert_eq!(carol_entries[0].action, LobbyAction::Full);
}

#[tokio::test]
async fn test_leaving_frees_seat_only_when_configured() {
    let keep = Arc::new(SessionHost::new());
    let release = Arc::new(SessionHost::with_config(
        HostConfig::new().with_seat_release(SeatReleasePolicy::ReleaseWhileWaiting),
    ));

    for (host, still_seated) in [(keep, true), (release, false)] {
        let alice = client(&host, "alice");
        let bob = client(&host, "bob");
        let id = alice.create(Capacity::Two).await.unwrap().id;
        bob.join(&id).await.unwrap();

        let (sync, mut events) = bob.subscribe(&id);
        wait_for(&mut events, |e| matches!(e, SyncEvent::Snapshot(_))).await;
        sync.leave().await;

        let snap = alice.resume(&id).await.unwrap();
        assert_eq!(snap.has_player("bob"), still_seated);
    }
}

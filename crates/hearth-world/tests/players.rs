//! Integration tests for the player state manager: movement ticks,
//! flushing to a store, and the positions shown to new sessions.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hearth_protocol::{Channel, Frame, PlayerId, Vector, parse_position};
use hearth_session::{Hub, outbound_queue};
use hearth_transport::ConnectionId;
use hearth_world::{
    FlushReport, MemoryPlayerStore, PlayerManager, PlayerRecord, PlayerSeed,
    PlayerStore, StoreError,
};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u32) -> PlayerId {
    PlayerId(id)
}

fn seed(id: u32, x: f64, y: f64) -> PlayerSeed {
    PlayerSeed {
        id: pid(id),
        name: format!("player{id}"),
        position: Vector::new(x, y),
    }
}

async fn connect(hub: &Hub, id: u32) -> mpsc::Receiver<Arc<[u8]>> {
    let (handle, rx) = outbound_queue(ConnectionId::new(u64::from(id)), 64);
    hub.register(pid(id), handle).await.unwrap();
    rx
}

fn positions(rx: &mut mpsc::Receiver<Arc<[u8]>>) -> Vec<(PlayerId, Vector)> {
    let mut out = Vec::new();
    while let Ok(bytes) = rx.try_recv() {
        let frame = Frame::decode(&bytes).unwrap();
        if frame.channel == Channel::Position {
            out.push(parse_position(&frame.payload).unwrap());
        }
    }
    out
}

/// A store that refuses to save some identities.
struct FlakyStore {
    inner: MemoryPlayerStore,
    broken: HashSet<PlayerId>,
}

impl PlayerStore for FlakyStore {
    async fn load_player(&self, id: PlayerId) -> Result<PlayerRecord, StoreError> {
        self.inner.load_player(id).await
    }

    async fn save_position(&self, id: PlayerId, position: Vector) -> Result<(), StoreError> {
        if self.broken.contains(&id) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.save_position(id, position).await
    }
}

async fn store_with(ids: &[u32]) -> MemoryPlayerStore {
    let store = MemoryPlayerStore::new();
    for id in ids {
        store
            .insert(
                pid(*id),
                PlayerRecord {
                    name: format!("player{id}"),
                    position: Vector::ZERO,
                },
            )
            .await;
    }
    store
}

// =========================================================================
// ensure() / snapshot() / destinations
// =========================================================================

#[tokio::test]
async fn test_ensure_inserts_once_and_keeps_existing() {
    let players = PlayerManager::new();

    let first = players.ensure(seed(1, 2.0, 3.0)).await;
    assert_eq!(first.position, Vector::new(2.0, 3.0));
    assert_eq!(first.destination, first.position);

    players.set_destination(pid(1), Vector::new(9.0, 9.0)).await;
    let again = players.ensure(seed(1, 0.0, 0.0)).await;
    assert_eq!(again.position, Vector::new(2.0, 3.0));
    assert_eq!(again.destination, Vector::new(9.0, 9.0));
    assert_eq!(players.len().await, 1);
}

#[tokio::test]
async fn test_set_destination_untracked_is_noop() {
    let players = PlayerManager::new();
    assert!(!players.set_destination(pid(4), Vector::new(1.0, 1.0)).await);
    assert!(players.snapshot(pid(4)).await.is_none());
}

#[tokio::test]
async fn test_clear_destination_stops_player() {
    let players = PlayerManager::new();
    players.ensure(seed(1, 1.0, 1.0)).await;
    players.set_destination(pid(1), Vector::new(5.0, 5.0)).await;

    assert!(players.clear_destination(pid(1)).await);
    let state = players.snapshot(pid(1)).await.unwrap();
    assert_eq!(state.destination, state.position);
}

#[tokio::test]
async fn test_snapshot_serializes_without_destination() {
    let players = PlayerManager::new();
    players.ensure(seed(7, 1.5, -2.0)).await;
    players.set_destination(pid(7), Vector::new(3.0, 3.0)).await;

    let state = players.snapshot(pid(7)).await.unwrap();
    let json: serde_json::Value = serde_json::to_value(&state).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "id": 7,
            "name": "player7",
            "position": {"x": 1.5, "y": -2.0}
        })
    );
}

#[tokio::test]
async fn test_snapshot_all_is_ordered() {
    let players = PlayerManager::new();
    for id in [3, 1, 2] {
        players.ensure(seed(id, 0.0, 0.0)).await;
    }
    let ids: Vec<PlayerId> = players.snapshot_all().await.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![pid(1), pid(2), pid(3)]);
}

// =========================================================================
// tick()
// =========================================================================

#[tokio::test]
async fn test_tick_steps_without_overshoot() {
    let hub = Hub::new();
    let mut rx = connect(&hub, 9).await;
    let players = PlayerManager::new();
    players.ensure(seed(1, 0.0, 0.0)).await;
    players.set_destination(pid(1), Vector::new(10.0, 0.0)).await;

    let mut xs = Vec::new();
    for _ in 0..4 {
        assert_eq!(players.tick(3.0, &hub).await, 1);
        xs.push(players.snapshot(pid(1)).await.unwrap().position.x);
    }
    assert_eq!(xs, vec![3.0, 6.0, 9.0, 10.0]);

    // Arrived: no movement, no frame.
    assert_eq!(players.tick(3.0, &hub).await, 0);

    let seen: Vec<f64> = positions(&mut rx).iter().map(|(_, v)| v.x).collect();
    assert_eq!(seen, vec![3.0, 6.0, 9.0, 10.0]);
}

#[tokio::test]
async fn test_tick_idle_players_emit_nothing() {
    let hub = Hub::new();
    let mut rx = connect(&hub, 9).await;
    let players = PlayerManager::new();
    players.ensure(seed(1, 4.0, 4.0)).await;
    players.ensure(seed(2, -1.0, 0.0)).await;

    assert_eq!(players.tick(0.5, &hub).await, 0);
    assert!(positions(&mut rx).is_empty());
    assert_eq!(
        players.snapshot(pid(1)).await.unwrap().position,
        Vector::new(4.0, 4.0)
    );
}

#[tokio::test]
async fn test_tick_broadcasts_one_frame_per_moved_player() {
    let hub = Hub::new();
    let mut rx = connect(&hub, 9).await;
    let players = PlayerManager::new();
    players.ensure(seed(1, 0.0, 0.0)).await;
    players.ensure(seed(2, 0.0, 0.0)).await;
    players.ensure(seed(3, 0.0, 0.0)).await;
    players.set_destination(pid(1), Vector::new(0.0, 5.0)).await;
    players.set_destination(pid(3), Vector::new(-5.0, 0.0)).await;

    assert_eq!(players.tick(0.5, &hub).await, 2);

    let mut got = positions(&mut rx);
    got.sort_by_key(|(id, _)| *id);
    assert_eq!(
        got,
        vec![
            (pid(1), Vector::new(0.0, 0.5)),
            (pid(3), Vector::new(-0.5, 0.0)),
        ]
    );
}

// =========================================================================
// flush()
// =========================================================================

#[tokio::test]
async fn test_flush_saves_and_evicts_offline_players() {
    let hub = Hub::new();
    let _online = connect(&hub, 1).await;
    let players = PlayerManager::new();
    players.ensure(seed(1, 1.0, 1.0)).await;
    players.ensure(seed(2, 2.0, 2.0)).await;
    let store = store_with(&[1, 2]).await;

    let report = players.flush(&hub, &store).await;

    assert_eq!(
        report,
        FlushReport {
            saved: 2,
            failed: 0,
            evicted: 1
        }
    );
    assert!(players.snapshot(pid(1)).await.is_some());
    assert!(players.snapshot(pid(2)).await.is_none());
    assert_eq!(store.position(pid(1)).await, Some(Vector::new(1.0, 1.0)));
    assert_eq!(store.position(pid(2)).await, Some(Vector::new(2.0, 2.0)));
}

#[tokio::test]
async fn test_flush_failure_retains_state_and_continues() {
    let hub = Hub::new();
    let players = PlayerManager::new();
    players.ensure(seed(1, 1.0, 1.0)).await;
    players.ensure(seed(2, 2.0, 2.0)).await;
    let store = FlakyStore {
        inner: store_with(&[1, 2]).await,
        broken: HashSet::from([pid(1)]),
    };

    let report = players.flush(&hub, &store).await;

    assert_eq!(report.saved, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.evicted, 1);
    // Offline but unsaved: kept for the next attempt.
    assert!(players.snapshot(pid(1)).await.is_some());
    assert!(players.snapshot(pid(2)).await.is_none());
    assert_eq!(store.inner.position(pid(2)).await, Some(Vector::new(2.0, 2.0)));
}

/// Walks one player a step while its position is being saved, the way a
/// movement tick can between the flush's snapshot and its eviction check.
struct SteppingStore {
    inner: MemoryPlayerStore,
    players: PlayerManager,
    hub: Hub,
    stepped: AtomicBool,
}

impl PlayerStore for SteppingStore {
    async fn load_player(&self, id: PlayerId) -> Result<PlayerRecord, StoreError> {
        self.inner.load_player(id).await
    }

    async fn save_position(&self, id: PlayerId, position: Vector) -> Result<(), StoreError> {
        self.inner.save_position(id, position).await?;
        if !self.stepped.swap(true, Ordering::SeqCst) {
            self.players.tick(1.0, &self.hub).await;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_flush_keeps_offline_player_that_moved_during_save() {
    let hub = Hub::new();
    let players = PlayerManager::new();
    players.ensure(seed(2, 0.0, 0.0)).await;
    players.set_destination(pid(2), Vector::new(5.0, 0.0)).await;
    let store = SteppingStore {
        inner: store_with(&[2]).await,
        players: players.clone(),
        hub: hub.clone(),
        stepped: AtomicBool::new(false),
    };

    let first = players.flush(&hub, &store).await;

    assert_eq!(first.evicted, 0);
    assert_eq!(
        players.snapshot(pid(2)).await.map(|p| p.position),
        Some(Vector::new(1.0, 0.0))
    );

    let second = players.flush(&hub, &store).await;

    assert_eq!(second.evicted, 1);
    assert!(players.snapshot(pid(2)).await.is_none());
    assert_eq!(store.inner.position(pid(2)).await, Some(Vector::new(1.0, 0.0)));
}

#[tokio::test]
async fn test_flush_empty_table_is_noop() {
    let hub = Hub::new();
    let store = MemoryPlayerStore::new();
    let report = PlayerManager::new().flush(&hub, &store).await;
    assert_eq!(report, FlushReport::default());
}

// =========================================================================
// login_positions()
// =========================================================================

#[tokio::test]
async fn test_login_positions_lists_other_online_players() {
    let hub = Hub::new();
    let mut newcomer = connect(&hub, 1).await;
    let mut other = connect(&hub, 2).await;
    let players = PlayerManager::new();
    players.ensure(seed(1, 0.0, 0.0)).await;
    players.ensure(seed(2, 5.0, 6.0)).await;
    // Tracked but offline: not listed.
    players.ensure(seed(3, 7.0, 7.0)).await;

    let frames = players.login_positions(pid(1), &hub).await;

    assert_eq!(frames, vec![Frame::position(pid(2), Vector::new(5.0, 6.0))]);
    // Nothing goes through the hub.
    assert!(positions(&mut newcomer).is_empty());
    assert!(positions(&mut other).is_empty());
}

//! The authoritative table of player positions.
//!
//! [`PlayerManager`] owns one [`PlayerState`] per tracked identity. The
//! dispatch loop sets destinations, the tick loop walks positions toward
//! them and broadcasts the result, and the flush loop hands positions to a
//! [`PlayerStore`] and forgets players who are no longer online.
//!
//! # Locking
//!
//! The table has its own mutex, independent of the hub's. When both are
//! needed the player lock is taken first and the hub lock nested inside it
//! ([`flush`](PlayerManager::flush) checks `is_online` while holding the
//! table). Nothing takes them in the other order. [`tick`](PlayerManager::tick)
//! releases the table before broadcasting.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_protocol::{Frame, PlayerId, Vector};
use hearth_session::Hub;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::store::{PlayerRecord, PlayerStore};

/// A tracked player.
///
/// Serializes as the login snapshot (`id`, `name`, `position`); the
/// destination is server-side only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub position: Vector,
    /// Where the player is walking to. Equal to `position` when idle.
    #[serde(skip)]
    pub destination: Vector,
}

/// Initial data for a player that isn't tracked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSeed {
    pub id: PlayerId,
    pub name: String,
    pub position: Vector,
}

impl PlayerSeed {
    pub fn from_record(id: PlayerId, record: PlayerRecord) -> Self {
        Self {
            id,
            name: record.name,
            position: record.position,
        }
    }
}

impl From<PlayerState> for PlayerSeed {
    fn from(state: PlayerState) -> Self {
        Self {
            id: state.id,
            name: state.name,
            position: state.position,
        }
    }
}

/// Outcome of one [`PlayerManager::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Positions written to the store.
    pub saved: usize,
    /// Positions the store refused. Those players stay tracked.
    pub failed: usize,
    /// Saved players dropped from memory because they were offline.
    pub evicted: usize,
}

/// Cloneable handle to the shared player table.
#[derive(Debug, Clone, Default)]
pub struct PlayerManager {
    players: Arc<Mutex<HashMap<PlayerId, PlayerState>>>,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `seed` unless its identity is already tracked.
    ///
    /// Returns the tracked state either way; an existing entry is not
    /// overwritten.
    pub async fn ensure(&self, seed: PlayerSeed) -> PlayerState {
        let mut players = self.players.lock().await;
        players
            .entry(seed.id)
            .or_insert_with(|| {
                tracing::debug!(player_id = %seed.id, "tracking player");
                PlayerState {
                    id: seed.id,
                    name: seed.name,
                    position: seed.position,
                    destination: seed.position,
                }
            })
            .clone()
    }

    /// Copy of one player's state.
    pub async fn snapshot(&self, player_id: PlayerId) -> Option<PlayerState> {
        self.players.lock().await.get(&player_id).cloned()
    }

    /// Copy of every tracked player, ordered by identity.
    pub async fn snapshot_all(&self) -> Vec<PlayerState> {
        let players = self.players.lock().await;
        let mut all: Vec<PlayerState> = players.values().cloned().collect();
        all.sort_unstable_by_key(|p| p.id);
        all
    }

    /// Sets where a tracked player is heading. Returns `false` for an
    /// untracked identity.
    pub async fn set_destination(&self, player_id: PlayerId, destination: Vector) -> bool {
        match self.players.lock().await.get_mut(&player_id) {
            Some(player) => {
                player.destination = destination;
                true
            }
            None => false,
        }
    }

    /// Stops a player where it stands.
    pub async fn clear_destination(&self, player_id: PlayerId) -> bool {
        match self.players.lock().await.get_mut(&player_id) {
            Some(player) => {
                player.destination = player.position;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.players.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.lock().await.is_empty()
    }

    /// Advances every moving player by one step of at most `speed` and
    /// broadcasts each new position.
    ///
    /// Players already at their destination are untouched and produce no
    /// frame. Returns the number of players that moved.
    pub async fn tick(&self, speed: f64, hub: &Hub) -> usize {
        let frames: Vec<Frame> = {
            let mut players = self.players.lock().await;
            players
                .values_mut()
                .filter(|p| p.position != p.destination)
                .map(|p| {
                    p.position = p.position.move_towards(p.destination, speed);
                    Frame::position(p.id, p.position)
                })
                .collect()
        };

        for frame in &frames {
            hub.broadcast_all(frame).await;
        }
        frames.len()
    }

    /// Persists every tracked position and forgets players who have gone
    /// offline.
    ///
    /// A failed save is logged and the player is kept for the next flush;
    /// the rest of the batch carries on. An offline player is only dropped
    /// when the position just saved is still its current one. One that was
    /// still walking stays tracked, and a later flush saves where it ended
    /// up.
    pub async fn flush<S: PlayerStore>(&self, hub: &Hub, store: &S) -> FlushReport {
        let snapshot = self.snapshot_all().await;
        let mut report = FlushReport::default();
        if snapshot.is_empty() {
            return report;
        }
        tracing::info!(players = snapshot.len(), "saving player data");

        for player in snapshot {
            if let Err(e) = store.save_position(player.id, player.position).await {
                tracing::warn!(player_id = %player.id, error = %e, "failed to save player");
                report.failed += 1;
                continue;
            }
            report.saved += 1;

            let mut players = self.players.lock().await;
            let settled = players
                .get(&player.id)
                .is_some_and(|current| current.position == player.position);
            if settled && !hub.is_online(player.id).await {
                players.remove(&player.id);
                report.evicted += 1;
                tracing::debug!(player_id = %player.id, "evicted offline player");
            }
        }

        tracing::info!(
            saved = report.saved,
            failed = report.failed,
            evicted = report.evicted,
            "player data flushed"
        );
        report
    }

    /// Position frames for every online, tracked player other than
    /// `player_id`: what a newly connected player needs to see everyone
    /// else.
    pub async fn login_positions(&self, player_id: PlayerId, hub: &Hub) -> Vec<Frame> {
        let online = hub.online().await;
        let players = self.players.lock().await;
        online
            .iter()
            .filter(|id| **id != player_id)
            .filter_map(|id| players.get(id))
            .map(|p| Frame::position(p.id, p.position))
            .collect()
    }
}

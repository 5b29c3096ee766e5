//! Persistence hand-off for player state.
//!
//! Hearth keeps positions in memory and writes them out on a slow interval.
//! Where they go is up to the deployment: anything implementing
//! [`PlayerStore`] works. [`MemoryPlayerStore`] is the development and test
//! backend.

use std::collections::HashMap;
use std::future::Future;

use hearth_protocol::{PlayerId, Vector};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Errors a [`PlayerStore`] can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store has no record for this identity.
    #[error("no stored record for player {0}")]
    NotFound(PlayerId),

    /// The backend failed (I/O, connection, constraint, ...).
    #[error("player store backend failure: {0}")]
    Backend(String),
}

/// What the store knows about a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub position: Vector,
}

/// Durable storage for player records.
pub trait PlayerStore: Send + Sync + 'static {
    /// Loads a player's name and last saved position.
    fn load_player(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<PlayerRecord, StoreError>> + Send;

    /// Persists a player's current position.
    fn save_position(
        &self,
        player_id: PlayerId,
        position: Vector,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory [`PlayerStore`].
///
/// Saving a position for an identity without a record is
/// [`StoreError::NotFound`], matching a store where rows are only created at
/// sign-up.
#[derive(Debug, Default)]
pub struct MemoryPlayerStore {
    records: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl MemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a record.
    pub async fn insert(&self, player_id: PlayerId, record: PlayerRecord) {
        self.records.write().await.insert(player_id, record);
    }

    /// Current stored position, if any.
    pub async fn position(&self, player_id: PlayerId) -> Option<Vector> {
        self.records
            .read()
            .await
            .get(&player_id)
            .map(|r| r.position)
    }
}

impl FromIterator<(PlayerId, PlayerRecord)> for MemoryPlayerStore {
    fn from_iter<I: IntoIterator<Item = (PlayerId, PlayerRecord)>>(
        iter: I,
    ) -> Self {
        Self {
            records: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl PlayerStore for MemoryPlayerStore {
    async fn load_player(
        &self,
        player_id: PlayerId,
    ) -> Result<PlayerRecord, StoreError> {
        self.records
            .read()
            .await
            .get(&player_id)
            .cloned()
            .ok_or(StoreError::NotFound(player_id))
    }

    async fn save_position(
        &self,
        player_id: PlayerId,
        position: Vector,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&player_id)
            .ok_or(StoreError::NotFound(player_id))?;
        record.position = position;
        Ok(())
    }
}

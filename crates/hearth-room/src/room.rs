//! The room: a capacity-bounded member list.

use std::sync::Arc;

use hearth_protocol::PlayerId;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{RoomConfig, RoomError};

/// One member of the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomMember {
    pub id: PlayerId,
    pub name: String,
}

/// A successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub member: RoomMember,
    /// Members who were already in the room, in join order.
    pub earlier: Vec<RoomMember>,
}

/// Cloneable handle to a shared room.
///
/// Membership only grows; a member stays for the lifetime of the room.
#[derive(Debug, Clone)]
pub struct Room {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: RoomConfig,
    members: Mutex<Vec<RoomMember>>,
}

impl Room {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                members: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds a member and returns it with the roster it joined.
    ///
    /// Capacity is checked before membership, both under one lock, and the
    /// roster is read under the same lock.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] if the room is at `max_players`
    /// - [`RoomError::AlreadyJoined`] if `player_id` is already a member
    pub async fn join(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
    ) -> Result<Joined, RoomError> {
        let mut members = self.inner.members.lock().await;
        if members.len() >= self.inner.config.max_players {
            return Err(RoomError::RoomFull(self.inner.config.max_players));
        }
        if members.iter().any(|m| m.id == player_id) {
            return Err(RoomError::AlreadyJoined(player_id));
        }

        let member = RoomMember {
            id: player_id,
            name: name.into(),
        };
        let earlier = members.clone();
        members.push(member.clone());
        tracing::info!(
            %player_id,
            members = members.len(),
            max = self.inner.config.max_players,
            "player joined room"
        );
        Ok(Joined { member, earlier })
    }

    /// Members in join order.
    pub async fn members(&self) -> Vec<RoomMember> {
        self.inner.members.lock().await.clone()
    }

    /// Member identities in join order.
    pub async fn member_ids(&self) -> Vec<PlayerId> {
        self.inner
            .members
            .lock()
            .await
            .iter()
            .map(|m| m.id)
            .collect()
    }

    pub async fn contains(&self, player_id: PlayerId) -> bool {
        self.inner
            .members
            .lock()
            .await
            .iter()
            .any(|m| m.id == player_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.members.lock().await.is_empty()
    }

    pub async fn is_full(&self) -> bool {
        self.len().await >= self.inner.config.max_players
    }

    pub fn config(&self) -> &RoomConfig {
        &self.inner.config
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

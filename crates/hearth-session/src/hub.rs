//! The connection hub: who is online, and fan-out to their writers.
//!
//! The hub maps each online [`PlayerId`] to the [`SessionHandle`] of its
//! single live session. Every broadcast encodes the frame once and offers
//! the bytes to each target with a non-blocking `try_send`; a target whose
//! queue is full (or already closed) is a slow consumer and is evicted on
//! the spot.
//!
//! # Presence
//!
//! Every identity that leaves the hub (unregister, release, or eviction)
//! causes exactly one `PlayerDisconnected` broadcast to the remaining
//! sessions. That broadcast can evict further slow consumers, so departures
//! are processed from a worklist until it drains.
//!
//! # Locking
//!
//! One `tokio::sync::Mutex` guards the registry. It is never held across
//! socket I/O: delivery is `try_send` into in-memory queues.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_protocol::{Frame, PlayerId};
use hearth_transport::ConnectionId;
use tokio::sync::Mutex;
use tokio::sync::mpsc::error::TrySendError;

use crate::{SessionError, SessionHandle};

/// Cloneable handle to the shared session registry.
#[derive(Debug, Clone, Default)]
pub struct Hub {
    registry: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<PlayerId, SessionHandle>,
}

impl Registry {
    /// Offers `bytes` to every target still registered. Returns the
    /// identities evicted as slow consumers.
    fn deliver(
        &mut self,
        bytes: &Arc<[u8]>,
        targets: impl IntoIterator<Item = PlayerId>,
    ) -> Vec<PlayerId> {
        let mut evicted = Vec::new();
        for id in targets {
            let Some(handle) = self.sessions.get(&id) else {
                continue;
            };
            match handle.try_send(Arc::clone(bytes)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(player_id = %id, "slow consumer, evicting");
                    self.sessions.remove(&id);
                    evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(player_id = %id, "outbound queue closed, evicting");
                    self.sessions.remove(&id);
                    evicted.push(id);
                }
            }
        }
        evicted
    }

    /// Broadcasts one `PlayerDisconnected` per departed identity, following
    /// any evictions those broadcasts cause.
    fn settle(&mut self, mut departed: Vec<PlayerId>) {
        while let Some(id) = departed.pop() {
            let bytes: Arc<[u8]> = Frame::player_disconnected(id).encode().into();
            let everyone: Vec<PlayerId> = self.sessions.keys().copied().collect();
            departed.extend(self.deliver(&bytes, everyone));
            tracing::info!(player_id = %id, "player disconnected");
        }
    }

    fn broadcast(&mut self, frame: &Frame, targets: Vec<PlayerId>) {
        let bytes: Arc<[u8]> = frame.encode().into();
        let evicted = self.deliver(&bytes, targets);
        self.settle(evicted);
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `player_id` online with the given session.
    ///
    /// # Errors
    /// [`SessionError::DuplicateIdentity`] if the identity already has a
    /// session. The existing session is left untouched and `handle` is
    /// dropped, closing its queue.
    pub async fn register(
        &self,
        player_id: PlayerId,
        handle: SessionHandle,
    ) -> Result<(), SessionError> {
        let mut reg = self.registry.lock().await;
        if reg.sessions.contains_key(&player_id) {
            return Err(SessionError::DuplicateIdentity(player_id));
        }
        tracing::info!(%player_id, conn_id = %handle.conn_id(), "session registered");
        reg.sessions.insert(player_id, handle);
        Ok(())
    }

    /// Removes `player_id`'s session and tells everyone else it left.
    ///
    /// Returns `false` (and broadcasts nothing) if it wasn't online.
    pub async fn unregister(&self, player_id: PlayerId) -> bool {
        let mut reg = self.registry.lock().await;
        if reg.sessions.remove(&player_id).is_none() {
            return false;
        }
        reg.settle(vec![player_id]);
        true
    }

    /// Like [`unregister`](Self::unregister), but only if the registered
    /// session is bound to `conn_id`.
    ///
    /// Pumps call this on exit so a stale connection can't remove a newer
    /// session of the same identity.
    pub async fn release(&self, player_id: PlayerId, conn_id: ConnectionId) -> bool {
        let mut reg = self.registry.lock().await;
        match reg.sessions.get(&player_id) {
            Some(handle) if handle.conn_id() == conn_id => {}
            _ => return false,
        }
        reg.sessions.remove(&player_id);
        reg.settle(vec![player_id]);
        true
    }

    /// Sends `frame` to every online session.
    pub async fn broadcast_all(&self, frame: &Frame) {
        let mut reg = self.registry.lock().await;
        let targets = reg.sessions.keys().copied().collect();
        reg.broadcast(frame, targets);
    }

    /// Sends `frame` to every online session except `except`.
    pub async fn broadcast_all_except(&self, frame: &Frame, except: PlayerId) {
        let mut reg = self.registry.lock().await;
        let targets = reg
            .sessions
            .keys()
            .copied()
            .filter(|id| *id != except)
            .collect();
        reg.broadcast(frame, targets);
    }

    /// Sends `frame` to one session. Offline targets are skipped silently.
    pub async fn broadcast_to(&self, player_id: PlayerId, frame: &Frame) {
        let mut reg = self.registry.lock().await;
        reg.broadcast(frame, vec![player_id]);
    }

    /// Sends `frame` to each listed session that is online.
    pub async fn broadcast_to_set(&self, targets: &[PlayerId], frame: &Frame) {
        let mut reg = self.registry.lock().await;
        reg.broadcast(frame, targets.to_vec());
    }

    pub async fn is_online(&self, player_id: PlayerId) -> bool {
        self.registry.lock().await.sessions.contains_key(&player_id)
    }

    /// Identities currently online, in ascending order.
    pub async fn online(&self) -> Vec<PlayerId> {
        let reg = self.registry.lock().await;
        let mut ids: Vec<PlayerId> = reg.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of online sessions.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.lock().await.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

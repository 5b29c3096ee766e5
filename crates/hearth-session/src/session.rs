//! Per-session settings and the hub's handle to a session's writer.

use std::sync::Arc;
use std::time::Duration;

use hearth_transport::ConnectionId;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Liveness and sizing limits applied to every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the inbound loop waits for any read (data or pong) before
    /// tearing the session down.
    pub pong_wait: Duration,
    /// Deadline for a single write, heartbeat, or close.
    pub write_wait: Duration,
    /// Largest inbound frame accepted, in bytes.
    pub max_frame_size: usize,
    /// Capacity of the per-session outbound queue. A full queue marks the
    /// session as a slow consumer.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            max_frame_size: 512,
            outbound_capacity: 255,
        }
    }
}

impl SessionConfig {
    /// Heartbeat interval: 9/10 of the read window, so a pong can arrive
    /// before the window closes.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// The hub's end of a session: the sending half of its outbound queue.
///
/// The hub holds the only sender, so removing the handle from the hub is
/// what closes the queue and makes the writer finish.
#[derive(Debug)]
pub struct SessionHandle {
    conn_id: ConnectionId,
    outbound: mpsc::Sender<Arc<[u8]>>,
}

impl SessionHandle {
    /// The connection this session is bound to.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub(crate) fn try_send(
        &self,
        bytes: Arc<[u8]>,
    ) -> Result<(), mpsc::error::TrySendError<Arc<[u8]>>> {
        self.outbound.try_send(bytes)
    }
}

/// Creates a session's outbound queue.
///
/// The handle goes to [`Hub::register`](crate::Hub::register); the receiver
/// goes to [`spawn_pumps`](crate::spawn_pumps).
pub fn outbound_queue(
    conn_id: ConnectionId,
    capacity: usize,
) -> (SessionHandle, mpsc::Receiver<Arc<[u8]>>) {
    let (outbound, rx) = mpsc::channel(capacity.max(1));
    (SessionHandle { conn_id, outbound }, rx)
}

//! The two concurrent loops that serve one connection.
//!
//! ```text
//!                 ┌──────────── inbound loop ─────────────┐
//!   socket ──────►│ recv (pong_wait deadline) → decode    │──► dispatch queue
//!                 └───────────────────────────────────────┘
//!                              ▲ stop
//!                 ┌────────────┴─ outbound loop ──────────┐
//!   socket ◄──────│ queued bytes / heartbeat (write_wait) │◄── outbound queue
//!                 └───────────────────────────────────────┘
//! ```
//!
//! Whichever loop fails first ends the session. The inbound loop sends a
//! close (with a size code for an oversized frame) and releases the
//! identity from the hub, which drops the outbound queue and ends the
//! outbound loop. The outbound loop, on a failed write, signals the inbound
//! loop to stop.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hearth_protocol::{ClientMessage, Frame, Inbound, PlayerId};
use hearth_transport::{CloseReason, Connection, Received};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{Hub, SessionConfig};

/// Join handles of a session's two loops.
#[derive(Debug)]
pub struct PumpHandles {
    pub inbound: JoinHandle<()>,
    pub outbound: JoinHandle<()>,
}

/// Spawns the inbound and outbound loops for an admitted connection.
///
/// The session must already be registered in `hub` under `player_id` with
/// the handle paired to `outbound_rx`.
pub fn spawn_pumps<C: Connection>(
    conn: C,
    player_id: PlayerId,
    outbound_rx: mpsc::Receiver<Arc<[u8]>>,
    hub: Hub,
    inbound_tx: mpsc::Sender<Inbound>,
    config: &SessionConfig,
) -> PumpHandles {
    let conn = Arc::new(conn);
    let (stop_tx, stop_rx) = watch::channel(false);

    let outbound = tokio::spawn(outbound_loop(
        Arc::clone(&conn),
        player_id,
        outbound_rx,
        config.clone(),
        stop_tx,
    ));
    let inbound = tokio::spawn(inbound_loop(
        conn,
        player_id,
        hub,
        inbound_tx,
        config.clone(),
        stop_rx,
    ));

    PumpHandles { inbound, outbound }
}

async fn inbound_loop<C: Connection>(
    conn: Arc<C>,
    player_id: PlayerId,
    hub: Hub,
    inbound_tx: mpsc::Sender<Inbound>,
    config: SessionConfig,
    mut stop: watch::Receiver<bool>,
) {
    let conn_id = conn.id();

    let (reason, close) = loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => break ("outbound loop stopped", CloseReason::Normal),
            next = time::timeout(config.pong_wait, conn.recv()) => next,
        };

        let data = match next {
            Err(_) => break ("read deadline expired", CloseReason::Normal),
            Ok(Err(e)) => {
                tracing::debug!(%player_id, %conn_id, error = %e, "read failed");
                break ("read failed", CloseReason::Normal);
            }
            Ok(Ok(None)) => break ("closed by peer", CloseReason::Normal),
            Ok(Ok(Some(Received::Heartbeat))) => continue,
            Ok(Ok(Some(Received::Oversized(len)))) => {
                tracing::warn!(
                    %player_id,
                    len,
                    max = config.max_frame_size,
                    "inbound frame refused while reading"
                );
                break ("frame too large", CloseReason::TooLarge);
            }
            Ok(Ok(Some(Received::Data(data)))) => data,
        };

        if data.len() > config.max_frame_size {
            tracing::warn!(
                %player_id,
                len = data.len(),
                max = config.max_frame_size,
                "inbound frame too large"
            );
            break ("frame too large", CloseReason::TooLarge);
        }

        let message = match Frame::decode(&data).and_then(ClientMessage::try_from) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "protocol violation");
                break ("protocol violation", CloseReason::Normal);
            }
        };

        let inbound = Inbound { player_id, message };
        tokio::select! {
            biased;
            _ = stop.changed() => break ("outbound loop stopped", CloseReason::Normal),
            sent = inbound_tx.send(inbound) => {
                if sent.is_err() {
                    break ("dispatch closed", CloseReason::Normal);
                }
            }
        }
    };

    tracing::debug!(%player_id, %conn_id, reason, "inbound loop exiting");
    // Goes out before the release drops the outbound queue.
    write(config.write_wait, player_id, "close", conn.close(close)).await;
    hub.release(player_id, conn_id).await;
}

async fn outbound_loop<C: Connection>(
    conn: Arc<C>,
    player_id: PlayerId,
    mut outbound_rx: mpsc::Receiver<Arc<[u8]>>,
    config: SessionConfig,
    stop: watch::Sender<bool>,
) {
    let period = config.ping_period();
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            item = outbound_rx.recv() => match item {
                Some(bytes) => {
                    if !write(config.write_wait, player_id, "send", conn.send(&bytes)).await {
                        break "write failed";
                    }
                }
                None => {
                    write(config.write_wait, player_id, "close", conn.close(CloseReason::Normal)).await;
                    break "outbound queue closed";
                }
            },
            _ = heartbeat.tick() => {
                if !write(config.write_wait, player_id, "ping", conn.ping()).await {
                    break "heartbeat failed";
                }
            }
        }
    };

    tracing::debug!(%player_id, conn_id = %conn.id(), reason, "outbound loop exiting");
    let _ = stop.send(true);
}

/// Runs one write under the write deadline. Returns `false` on failure.
async fn write<E: fmt::Display>(
    wait: Duration,
    player_id: PlayerId,
    what: &'static str,
    op: impl Future<Output = Result<(), E>>,
) -> bool {
    match time::timeout(wait, op).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(%player_id, op = what, error = %e, "write failed");
            false
        }
        Err(_) => {
            tracing::warn!(%player_id, op = what, "write deadline expired");
            false
        }
    }
}

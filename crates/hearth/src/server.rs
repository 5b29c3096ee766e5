//! `HearthServer` builder and server loop.
//!
//! This is the entry point for running a Hearth server. It ties together
//! all the layers: transport → session (hub, pumps) → dispatch → world.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hearth_protocol::Inbound;
use hearth_room::{Room, RoomConfig};
use hearth_session::{Authenticator, Hub, SessionConfig};
use hearth_tick::TickScheduler;
use hearth_transport::{Transport, TransportError, WebSocketTransport};
use hearth_world::{PlayerManager, PlayerStore};
use tokio::sync::{mpsc, watch};

use crate::HearthError;
use crate::config::HearthConfig;
use crate::dispatch::dispatch_loop;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task and to the
/// dispatch loop.
pub(crate) struct ServerState<A: Authenticator, S: PlayerStore> {
    pub(crate) hub: Hub,
    pub(crate) players: PlayerManager,
    pub(crate) room: Room,
    pub(crate) auth: A,
    pub(crate) store: S,
    pub(crate) session_config: SessionConfig,
    pub(crate) inbound_tx: mpsc::Sender<Inbound>,
}

/// How the world loops are paced.
#[derive(Debug, Clone, Copy)]
struct WorldTiming {
    move_speed: f64,
    tick_interval: Duration,
    save_interval: Duration,
}

/// Builder for configuring and starting a Hearth server.
///
/// # Example
///
/// ```rust,ignore
/// let server = HearthServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .move_speed(0.5)
///     .build(authenticator, player_store)
///     .await?;
/// server.run().await
/// ```
pub struct HearthServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    inbound_capacity: usize,
    room_config: RoomConfig,
    timing: WorldTiming,
}

impl HearthServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&HearthConfig::default())
    }

    /// Creates a builder from a loaded configuration file.
    pub fn from_config(config: &HearthConfig) -> Self {
        Self {
            bind_addr: config.server.bind_address.clone(),
            session_config: config.session.session_config(),
            inbound_capacity: config.session.inbound_capacity,
            room_config: config.room.clone(),
            timing: WorldTiming {
                move_speed: config.world.move_speed,
                tick_interval: config.world.tick_interval(),
                save_interval: config.world.save_interval(),
            },
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Capacity of the queue between the session readers and the dispatch
    /// loop. A full queue makes readers wait.
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Distance a moving player covers per movement tick.
    pub fn move_speed(mut self, speed: f64) -> Self {
        self.timing.move_speed = speed;
        self
    }

    /// Movement tick interval. Zero disables movement.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.timing.tick_interval = interval;
        self
    }

    /// Persistence flush interval. Zero disables periodic flushing; the
    /// final flush at shutdown still runs.
    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.timing.save_interval = interval;
        self
    }

    /// Binds the listener and assembles the server.
    pub async fn build<A: Authenticator, S: PlayerStore>(
        self,
        auth: A,
        store: S,
    ) -> Result<HearthServer<A, S>, HearthError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let (inbound_tx, inbound_rx) = mpsc::channel(self.inbound_capacity.max(1));

        let state = Arc::new(ServerState {
            hub: Hub::new(),
            players: PlayerManager::new(),
            room: Room::new(self.room_config),
            auth,
            store,
            session_config: self.session_config,
            inbound_tx,
        });

        Ok(HearthServer {
            transport,
            state,
            inbound_rx,
            timing: self.timing,
        })
    }
}

impl Default for HearthServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Hearth server.
///
/// Built by [`HearthServerBuilder`]. Call [`run()`](Self::run) to start
/// accepting connections.
pub struct HearthServer<A: Authenticator, S: PlayerStore> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S>>,
    inbound_rx: mpsc::Receiver<Inbound>,
    timing: WorldTiming,
}

impl<A: Authenticator, S: PlayerStore> HearthServer<A, S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The session registry. Cloning shares it.
    pub fn hub(&self) -> Hub {
        self.state.hub.clone()
    }

    /// The authoritative player table. Cloning shares it.
    pub fn players(&self) -> PlayerManager {
        self.state.players.clone()
    }

    pub fn room(&self) -> Room {
        self.state.room.clone()
    }

    /// Runs the server until the process is terminated.
    pub async fn run(self) -> Result<(), HearthError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop plus the dispatch, movement and flush loops
    /// until `shutdown` resolves, then flushes every tracked position one
    /// last time.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), HearthError> {
        tracing::info!(
            move_speed = self.timing.move_speed,
            tick_ms = self.timing.tick_interval.as_millis() as u64,
            save_secs = self.timing.save_interval.as_secs(),
            "Hearth server running"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let tasks = [
            tokio::spawn(dispatch_loop(
                Arc::clone(&self.state),
                self.inbound_rx,
                stop_rx.clone(),
            )),
            tokio::spawn(movement_loop(
                Arc::clone(&self.state),
                self.timing,
                stop_rx.clone(),
            )),
            tokio::spawn(flush_loop(
                Arc::clone(&self.state),
                self.timing.save_interval,
                stop_rx,
            )),
        ];

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => accepted,
            };

            match accepted {
                Ok(upgrade) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(upgrade, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }

        tracing::info!("shutting down");
        // Receivers may already be gone if a loop panicked.
        let _ = stop_tx.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "server loop panicked");
            }
        }

        let report = self
            .state
            .players
            .flush(&self.state.hub, &self.state.store)
            .await;
        tracing::info!(saved = report.saved, failed = report.failed, "final flush complete");

        self.transport.shutdown().await?;
        Ok(())
    }
}

/// Advances player movement every tick.
async fn movement_loop<A: Authenticator, S: PlayerStore>(
    state: Arc<ServerState<A, S>>,
    timing: WorldTiming,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticks = TickScheduler::every(timing.tick_interval);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            info = ticks.wait_for_tick() => {
                let moved = state.players.tick(timing.move_speed, &state.hub).await;
                if moved > 0 {
                    tracing::trace!(tick = info.tick, moved, "movement tick");
                }
            }
        }
    }
    tracing::debug!(ticks = ticks.tick_count(), "movement loop stopped");
}

/// Hands positions to the player store on a slow interval.
async fn flush_loop<A: Authenticator, S: PlayerStore>(
    state: Arc<ServerState<A, S>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticks = TickScheduler::every(interval);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticks.wait_for_tick() => {
                state.players.flush(&state.hub, &state.store).await;
            }
        }
    }
}

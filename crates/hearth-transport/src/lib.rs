//! Transport abstraction layer for Hearth.
//!
//! Provides the [`Transport`], [`Upgrade`] and [`Connection`] traits that
//! the session layer is written against, plus the WebSocket implementation.
//!
//! Accepting is split in two. [`Transport::accept`] only takes the TCP
//! connection; the [`Upgrade`] it returns reads the HTTP request and is
//! answered by the caller, so a peer can be refused with a plain `401`
//! before any WebSocket exists.
//!
//! A [`Connection`] is split internally so that one task may block in
//! [`Connection::recv`] while another task writes with
//! [`Connection::send`] or [`Connection::ping`]. The session pumps rely on
//! this: reading and writing are independent loops.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport, WebSocketUpgrade};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Request metadata read from an upgrade request.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Remote address of the peer.
    pub peer_addr: SocketAddr,
    /// Raw value of the `authorization` request header, if present.
    pub authorization: Option<String>,
}

/// One item read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// An application payload.
    Data(Vec<u8>),
    /// A ping or pong from the peer. Carries no data but proves liveness.
    Heartbeat,
    /// The peer started a message longer than the connection's limit. The
    /// payload was refused while reading; the value is the announced size.
    Oversized(usize),
}

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Ordinary end of a session.
    Normal,
    /// The peer sent a message over the size limit.
    TooLarge,
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The pending upgrade produced for each accepted peer.
    type Upgrade: Upgrade;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer. The returned upgrade has not read anything
    /// yet, so the caller can hand it to its own task before the request
    /// arrives.
    async fn accept(&mut self) -> Result<Self::Upgrade, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A peer whose upgrade request has not been answered yet.
///
/// The caller reads the request, decides, and then either
/// [`accept`](Self::accept)s it or [`refuse`](Self::refuse)s it. A refused
/// peer never sees a connection.
pub trait Upgrade: Send + 'static {
    /// The connection produced by a completed upgrade.
    type Connection: Connection<Error = Self::Error>;
    /// The error type for upgrade operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The identifier the resulting connection will carry.
    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;

    /// Reads and validates the upgrade request.
    fn read_request(
        &mut self,
    ) -> impl Future<Output = Result<Handshake, Self::Error>> + Send;

    /// Completes the upgrade. Messages longer than `max_message_size`
    /// bytes are refused while they are read.
    fn accept(
        self,
        max_message_size: usize,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Answers the request with `401 Unauthorized` and drops the peer.
    fn refuse(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
///
/// Methods return `Send` futures so generic callers can drive them from
/// spawned tasks.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a binary payload to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next item from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Received>, Self::Error>> + Send;

    /// Sends a liveness ping. The peer is expected to answer with a pong,
    /// which surfaces from [`recv`](Self::recv) as [`Received::Heartbeat`].
    fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Sends a close notification carrying `reason`.
    fn close(
        &self,
        reason: CloseReason,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

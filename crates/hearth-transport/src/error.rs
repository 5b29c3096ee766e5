use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// A peer connected but the WebSocket upgrade did not complete. Only
    /// that peer is affected; the listener keeps accepting.
    #[error("upgrade from {peer} failed: {reason}")]
    Upgrade { peer: SocketAddr, reason: String },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a message failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a message failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

//! Error types for the protocol layer.
//!
//! Each crate in Hearth defines its own error enum. When you see a
//! `ProtocolError`, you know the peer sent bytes that don't follow the
//! wire format, not that the network or the simulation failed.

use crate::Channel;

/// Errors that can occur while decoding or building frames.
///
/// Every decoding variant is fatal for the connection that produced it:
/// the session layer tears the connection down rather than trying to
/// resynchronise a byte stream it no longer trusts.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is too short for its tag, or its payload has the wrong
    /// size or contents for its channel.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The channel tag is outside the declared [`Channel`] range.
    #[error("unknown channel tag {0}")]
    UnknownChannel(u16),

    /// A known channel arrived in the wrong direction, e.g. a client
    /// sending on a server-to-client channel.
    #[error("unexpected message on channel {0}")]
    UnexpectedChannel(Channel),

    /// JSON encoding of a structured payload failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

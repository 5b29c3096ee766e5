//! Unified error type for the Hearth server.

use hearth_protocol::ProtocolError;
use hearth_room::RoomError;
use hearth_session::SessionError;
use hearth_transport::TransportError;
use hearth_world::StoreError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, encode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, duplicate identity).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The player store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room join was refused.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Installing the log subscriber failed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use hearth_protocol::PlayerId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Transport(_)));
        assert!(hearth_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::UnknownChannel(99);
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Protocol(_)));
        assert!(hearth_err.to_string().contains("99"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::DuplicateIdentity(PlayerId(3));
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Session(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::NotFound(PlayerId(4));
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Store(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::RoomFull(5);
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Room(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid("bad".into());
        let hearth_err: HearthError = err.into();
        assert!(matches!(hearth_err, HearthError::Config(_)));
        assert_eq!(hearth_err.to_string(), "invalid config: bad");
    }
}

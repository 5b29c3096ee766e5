//! Error types for the session layer.

use hearth_protocol::PlayerId;

/// Errors that can occur while admitting or registering a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was missing, garbled, or rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The identity already has a live session. The existing session is
    /// left untouched.
    #[error("player {0} already has an active session")]
    DuplicateIdentity(PlayerId),

    /// The credential backend could not be reached.
    #[error("credential store failure: {0}")]
    Store(String),
}

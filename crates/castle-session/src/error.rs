//! Error types for the session layer.

use castle_protocol::SessionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The presented reconnection token doesn't match anything the
    /// server issued. Could be stale, mistyped, or forged.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The reconnection grace window elapsed before the player came back.
    #[error("session {0} expired")]
    SessionExpired(SessionId),

    /// The session is still connected — there is nothing to resume.
    #[error("session {0} is already connected")]
    AlreadyConnected(SessionId),
}

//! Unified error type for the Castle server.

use castle_protocol::ProtocolError;
use castle_room::RoomError;
use castle_session::SessionError;
use castle_transport::TransportError;

/// Top-level error wrapping each layer's error type.
///
/// The `#[from]` attributes let `?` lift sub-crate errors automatically,
/// so the server and handler code stay free of conversion noise.
#[derive(Debug, thiserror::Error)]
pub enum CastleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown token, expired grace window).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, illegal move).
    #[error(transparent)]
    Room(#[from] RoomError),
}

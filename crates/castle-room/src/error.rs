//! Error types for the room layer.
//!
//! Every variant is reported to the originating caller only — a room
//! operation either completes and broadcasts, or fails and changes
//! nothing. There is no fatal error here: the worst a room anomaly can
//! do is terminate that one room.

use castle_protocol::RoomCode;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists (or it has already been reclaimed).
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// Both seats are taken or reserved for reconnection.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The rules engine rejected the move. No state changed.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The caller's seat is not the side to move.
    #[error("not your turn")]
    NotYourTurn,

    /// The caller asked to act for a seat their session does not occupy.
    #[error("seat does not belong to this session")]
    SeatMismatch,

    /// The caller's seat is permanently barred from offering draws.
    /// Rejected silently — the room is never told.
    #[error("draw offers are disabled for this seat")]
    DrawDisabled,

    /// The room's phase doesn't allow this operation — e.g. a move
    /// before activation or after the game finished.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's command channel is closed; the actor is gone.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

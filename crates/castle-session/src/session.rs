//! Session types: the server's record of a seated player.
//!
//! A session is born when a player takes a seat and is the stable
//! identity that survives transport churn: the WebSocket may drop and be
//! redialed, but the session — and the secret token that proves
//! ownership of it — stays the same.

use std::time::Instant;

use castle_protocol::{RoomCode, Seat, SessionId, SessionToken};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player has to present their token again
    /// before the session is permanently expired. Set to 0 to disable
    /// reconnection entirely.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The connection state of a session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapses)──→ Expired
///       ↑                            │
///       └────────(resume)────────────┘
/// ```
///
/// `Instant` is monotonic, so the grace window cannot be confused by
/// system clock adjustments.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// The player's connection is live.
    Connected,

    /// The connection dropped at `since`; the seat is held for them
    /// until the grace window closes.
    Disconnected { since: Instant },

    /// Grace window elapsed without a resume. Awaiting cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's binding of a live(ish) connection to a `(room, seat)`.
///
/// The room never sees this struct — it only holds the opaque
/// [`SessionId`]. Connections never see each other's tokens.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque identifier handed to the room as the seat occupant.
    pub id: SessionId,

    /// Secret reconnection key, issued once at first join. A rejoining
    /// client is matched by presenting this token, never by its
    /// transport identity.
    pub token: SessionToken,

    /// The room this session is seated in.
    pub room: RoomCode,

    /// The seat this session occupies there.
    pub seat: Seat,

    /// Current connection state.
    pub state: SessionState,
}

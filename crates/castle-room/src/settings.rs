//! Room settings and the room lifecycle state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Tunable timing and capacity settings shared by every room.
///
/// Defaults are the production constants; tests shrink the windows
/// instead of sleeping through them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    /// Grace period during which a vacated seat is reserved for its
    /// original occupant. When it elapses without a rejoin the game is
    /// forfeited by the vacated seat.
    pub reconnect_window: Duration,

    /// A room untouched for this long is eligible for eviction.
    pub idle_ttl: Duration,

    /// How often the registry's background sweep runs.
    pub sweep_interval: Duration,

    /// Command channel capacity per room actor. Senders wait when it
    /// fills (bounded channel backpressure).
    pub channel_size: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            reconnect_window: Duration::from_secs(30),
            idle_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// Transitions only ever move forward:
///
/// ```text
/// Waiting → Active → Finished
/// ```
///
/// with one shortcut — a room abandoned before both seats fill goes
/// straight from Waiting to Finished. Never backward: once Finished, no
/// move, draw offer, resignation, or flag claim is accepted again.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Phase {
    /// Room exists, at least one seat is still unassigned.
    Waiting,
    /// Both seats occupied at least once; moves are being played.
    Active,
    /// The game reached a terminal state.
    Finished,
}

impl Phase {
    /// The next phase in normal progression, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// `true` while moves and offers are accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// `true` once the room has reached a terminal state.
    pub fn is_over(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

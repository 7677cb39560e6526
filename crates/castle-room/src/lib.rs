//! Room lifecycle management for Castle.
//!
//! Each room runs as an isolated Tokio task (actor model) owning one
//! game's seating, position handle, clocks, and draw ledger. Rooms are
//! the unit of isolation: commands for the same room are serialized
//! through its channel, while different rooms proceed fully in parallel.
//!
//! # Key types
//!
//! - [`RulesEngine`] — the seam to the external chess rules implementation
//! - [`RoomRegistry`] — creates, finds, and reclaims rooms
//! - [`RoomHandle`] — send operations to a running room actor
//! - [`Phase`] — the Waiting → Active → Finished lifecycle
//! - [`DrawBook`] — draw-offer escalation and throttling
//! - [`RoomSettings`] — reconnection window, idle TTL, sweep interval

mod draw;
mod error;
mod registry;
mod room;
mod rules;
mod settings;

pub use draw::{DrawBook, OfferOutcome};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{
    JoinGrant, Outcome, RoomHandle, RoomStatus, SeatSender, SeatSlot,
};
pub use rules::{DrawKind, RulesEngine, Verdict};
pub use settings::{Phase, RoomSettings};

//! # Castle
//!
//! Multiplayer chess session coordinator: a server that creates and
//! tracks concurrent game rooms, arbitrates seating, relays moves
//! through an external rules engine, keeps per-player clocks, referees
//! draw negotiation, and survives transient disconnects with a
//! reconnection grace window.
//!
//! The layers, bottom up: `castle-transport` (WebSocket), then
//! `castle-protocol` (wire messages), `castle-clock` and
//! `castle-session` (time and identity), `castle-room` (the per-game
//! actors and their registry), and this crate — the gateway that wires
//! them together behind [`CastleServer`].
//!
//! ```rust,no_run
//! use castle::{CastleServerBuilder, StandardChess};
//!
//! # async fn run() -> Result<(), castle::CastleError> {
//! let server = CastleServerBuilder::new()
//!     .bind("0.0.0.0:4000")
//!     .build::<StandardChess>()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod rules;
mod server;

pub use error::CastleError;
pub use rules::StandardChess;
pub use server::{CastleServer, CastleServerBuilder};

//! Wire protocol for Castle.
//!
//! This crate defines the "language" that chess clients and the
//! coordination server speak:
//!
//! - **Identity** ([`Seat`], [`RoomCode`], [`SessionId`], [`SessionToken`])
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) and the clock
//!   payloads that ride along with them ([`TimeControl`], [`ClockSnapshot`])
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how messages become bytes
//! - **Errors** ([`ProtocolError`])
//!
//! The protocol layer knows nothing about connections, rooms, or chess —
//! it only describes the shapes that cross the wire.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ClockSnapshot, RoomCode, Seat, ServerMessage, SessionId,
    SessionToken, TimeControl, ROOM_CODE_ALPHABET, ROOM_CODE_LEN,
};

//! The `RulesEngine` trait — the boundary to the external chess rules
//! implementation.
//!
//! The coordinator treats chess itself as a black box: it never inspects
//! a position, derives legality, or re-classifies an ending. Everything
//! it needs is behind these five functions, and the position handle is
//! opaque to every other module. Tests plug in a scripted engine;
//! production plugs in a real one.

use castle_protocol::Seat;

/// Move legality and terminal-state classification for one game.
pub trait RulesEngine: Send + Sync + 'static {
    /// Opaque position handle. Owned by the room, interpreted only by
    /// the engine.
    type Position: Clone + Send + Sync + 'static;

    /// The starting position.
    fn initial() -> Self::Position;

    /// Applies a move, producing the resulting position.
    ///
    /// The call is synchronous and bounded — the room actor invokes it
    /// inline. An illegal move returns `Err` with the engine's reason
    /// and must leave no trace.
    fn apply(position: &Self::Position, mv: &str) -> Result<Self::Position, String>;

    /// Which seat is to move in this position.
    fn side_to_move(position: &Self::Position) -> Seat;

    /// Canonical board-state string for this position, as sent to clients.
    fn fen(position: &Self::Position) -> String;

    /// Terminal-state classification, or `None` while the game can
    /// continue.
    fn terminal(position: &Self::Position) -> Option<Verdict>;
}

/// How a position ended, as classified by the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The side that just moved delivered mate.
    Checkmate { winner: Seat },
    /// The position is drawn; the engine says why.
    Draw(DrawKind),
}

/// The engine's draw classification. Surfaced to players as-is rather
/// than collapsed into a single generic "drawn".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Stalemate,
    InsufficientMaterial,
    Repetition,
    FiftyMove,
}

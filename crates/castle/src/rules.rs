//! Standard-chess rules engine backed by the `chess` crate.
//!
//! This is the composition root's plug for the room layer's
//! [`RulesEngine`] seam. The coordinator never looks inside a position;
//! everything chess-specific lives behind these five functions.

use std::str::FromStr;

use castle_protocol::Seat;
use castle_room::{DrawKind, RulesEngine, Verdict};
use chess::{Board, BoardStatus, ChessMove, Color, Game, Piece};

/// Move legality and terminal classification for standard chess.
pub struct StandardChess;

fn seat_of(color: Color) -> Seat {
    match color {
        Color::White => Seat::White,
        Color::Black => Seat::Black,
    }
}

/// Accepts SAN first ("Nf3", "exd5"), falling back to coordinate
/// notation ("g1f3", "e7e8q") checked for legality against the board.
fn parse_move(board: &Board, mv: &str) -> Option<ChessMove> {
    ChessMove::from_san(board, mv).ok().or_else(|| {
        ChessMove::from_str(mv).ok().filter(|m| board.legal(*m))
    })
}

/// No mating material left: no pawns or major pieces, at most one minor
/// piece on the board.
fn insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn)
        | board.pieces(Piece::Rook)
        | board.pieces(Piece::Queen);
    if heavy.popcnt() > 0 {
        return false;
    }
    let minors = board.pieces(Piece::Knight) | board.pieces(Piece::Bishop);
    minors.popcnt() <= 1
}

impl RulesEngine for StandardChess {
    type Position = Game;

    fn initial() -> Game {
        Game::new()
    }

    fn apply(position: &Game, mv: &str) -> Result<Game, String> {
        let board = position.current_position();
        let parsed = parse_move(&board, mv)
            .ok_or_else(|| format!("move {mv} is not legal here"))?;

        let mut next = position.clone();
        if !next.make_move(parsed) {
            return Err(format!("move {mv} is not legal here"));
        }
        Ok(next)
    }

    fn side_to_move(position: &Game) -> Seat {
        seat_of(position.side_to_move())
    }

    fn fen(position: &Game) -> String {
        position.current_position().to_string()
    }

    fn terminal(position: &Game) -> Option<Verdict> {
        let board = position.current_position();
        match board.status() {
            BoardStatus::Checkmate => Some(Verdict::Checkmate {
                // The side to move is the side that got mated.
                winner: seat_of(board.side_to_move()).opponent(),
            }),
            BoardStatus::Stalemate => Some(Verdict::Draw(DrawKind::Stalemate)),
            BoardStatus::Ongoing => {
                if insufficient_material(&board) {
                    Some(Verdict::Draw(DrawKind::InsufficientMaterial))
                } else if position.can_declare_draw() {
                    // Threefold repetition or the fifty-move rule; the
                    // `chess` crate doesn't say which, so repetition is
                    // reported for both.
                    Some(Verdict::Draw(DrawKind::Repetition))
                } else {
                    None
                }
            }
        }
    }
}

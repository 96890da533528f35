//! Advisory legal targets
//!
//! Used only for highlighting. The server re-validates every move.

use crate::mirror::Role;
use chessroom_core::{Position, Square};

/// Squares the piece on `square` may move to, as seen by `role`
///
/// Empty unless `role` is seated, on turn, and owns the piece, and the
/// position is not already decided.
pub fn advisory_targets(board: &Position, role: Role, square: Square) -> Vec<Square> {
    let Some(color) = role.color() else {
        return Vec::new();
    };
    if board.side_to_move() != color || board.status().is_terminal() {
        return Vec::new();
    }
    match board.piece_at(square) {
        Some(piece) if piece.color == color => board.legal_targets(square),
        _ => Vec::new(),
    }
}

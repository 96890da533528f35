//! The rules engine seam
//!
//! The session coordinator treats the board as an opaque value owned by a
//! `RulesEngine` and only ever asks it questions through this trait.

use crate::board::Square;
use crate::game::{GameStatus, Position};
use crate::pieces::{Color, PieceKind, PROMOTION_KINDS};
use crate::wire::{MoveIntent, MoveRecord};
use crate::RulesError;

/// Legality, application and encoding of board positions
pub trait RulesEngine {
    type Board: Clone;

    /// Board at the start of a session
    fn initial(&self) -> Self::Board;

    fn side_to_move(&self, board: &Self::Board) -> Color;

    /// Validate and apply a move, returning the new board and move metadata
    fn apply(
        &self,
        board: &Self::Board,
        intent: &MoveIntent,
    ) -> Result<(Self::Board, MoveRecord), RulesError>;

    fn status(&self, board: &Self::Board) -> GameStatus;

    /// Destinations reachable from an occupied square by the side to move
    fn legal_targets(&self, board: &Self::Board, from: Square) -> Vec<Square>;

    /// Canonical text encoding of the full position
    fn encode(&self, board: &Self::Board) -> String;

    fn decode(&self, encoded: &str) -> Result<Self::Board, RulesError>;
}

/// Standard chess over [`Position`] with FEN encoding
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardChess;

impl RulesEngine for StandardChess {
    type Board = Position;

    fn initial(&self) -> Position {
        Position::starting()
    }

    fn side_to_move(&self, board: &Position) -> Color {
        board.side_to_move()
    }

    fn apply(
        &self,
        board: &Position,
        intent: &MoveIntent,
    ) -> Result<(Position, MoveRecord), RulesError> {
        let from: Square = intent.from.parse()?;
        let to: Square = intent.to.parse()?;
        // Unknown letters simply fail to match any promoting move
        let promotion = intent.promotion.as_deref().and_then(parse_promotion);

        let mv = board
            .find_move(from, to, promotion)
            .ok_or(RulesError::IllegalMove { from, to })?;
        let record = board.record(&mv);
        tracing::trace!(san = %record.san, "applied move");
        Ok((board.play(&mv), record))
    }

    fn status(&self, board: &Position) -> GameStatus {
        board.status()
    }

    fn legal_targets(&self, board: &Position, from: Square) -> Vec<Square> {
        board.legal_targets(from)
    }

    fn encode(&self, board: &Position) -> String {
        board.to_fen()
    }

    fn decode(&self, encoded: &str) -> Result<Position, RulesError> {
        Position::from_fen(encoded)
    }
}

fn parse_promotion(text: &str) -> Option<PieceKind> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            PieceKind::from_letter(letter).filter(|kind| PROMOTION_KINDS.contains(kind))
        }
        _ => None,
    }
}

//! Chessroom Core - Rules engine, clock and wire protocol
//!
//! This crate provides everything the server and the client share:
//! - Board geometry and piece definitions
//! - Position state, legal move generation and terminal detection
//! - FEN encoding and standard algebraic notation
//! - The `RulesEngine` seam the session coordinator talks to
//! - Per-color countdown clocks
//! - JSON wire events

pub mod board;
pub mod clock;
pub mod engine;
pub mod fen;
pub mod game;
pub mod pieces;
pub mod san;
pub mod wire;

// Re-exports for convenient access
pub use board::Square;
pub use clock::{Clock, Urgency};
pub use engine::{RulesEngine, StandardChess};
pub use fen::START_FEN;
pub use game::{CastlingRights, DrawReason, GameStatus, Move, Position};
pub use pieces::{Color, Piece, PieceKind};
pub use wire::{ClientEvent, MoveIntent, MoveRecord, ServerEvent};

/// Rules engine errors
///
/// The session coordinator never distinguishes between these; every
/// variant ends up as a `move-rejected` reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("malformed square: {0:?}")]
    MalformedSquare(String),

    #[error("illegal move {from}-{to}")]
    IllegalMove { from: Square, to: Square },

    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("malformed move payload: {0}")]
    MalformedPayload(String),
}

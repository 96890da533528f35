//! Standard algebraic notation for move history

use crate::game::{Move, MoveFlag, Position};
use crate::pieces::PieceKind;

/// Render a legal move of `position` in SAN, including check and mate suffixes
pub fn to_san(position: &Position, mv: &Move) -> String {
    let mut san = match mv.flag {
        MoveFlag::CastleKingSide => "O-O".to_string(),
        MoveFlag::CastleQueenSide => "O-O-O".to_string(),
        _ if mv.piece == PieceKind::Pawn => pawn_san(mv),
        _ => piece_san(position, mv),
    };

    let after = position.play(mv);
    if after.in_check() {
        san.push(if after.legal_moves().is_empty() { '#' } else { '+' });
    }
    san
}

fn pawn_san(mv: &Move) -> String {
    let mut san = String::new();
    if mv.captured.is_some() {
        san.push(crate::board::FILES[mv.from.file() as usize]);
        san.push('x');
    }
    san.push_str(&mv.to.to_string());
    if let Some(kind) = mv.promotion {
        san.push('=');
        san.push(kind.letter().to_ascii_uppercase());
    }
    san
}

fn piece_san(position: &Position, mv: &Move) -> String {
    let mut san = String::new();
    san.push(mv.piece.letter().to_ascii_uppercase());

    // Other pieces of the same kind that could also reach the destination
    let rivals: Vec<Move> = position
        .legal_moves()
        .into_iter()
        .filter(|other| other.piece == mv.piece && other.to == mv.to && other.from != mv.from)
        .collect();
    if !rivals.is_empty() {
        let from = mv.from.to_string();
        if rivals.iter().all(|r| r.from.file() != mv.from.file()) {
            san.push_str(&from[..1]);
        } else if rivals.iter().all(|r| r.from.rank() != mv.from.rank()) {
            san.push_str(&from[1..]);
        } else {
            san.push_str(&from);
        }
    }

    if mv.captured.is_some() {
        san.push('x');
    }
    san.push_str(&mv.to.to_string());
    san
}

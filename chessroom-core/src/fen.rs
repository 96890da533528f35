//! Forsyth-Edwards Notation encoding and decoding
//!
//! FEN is the canonical snapshot format broadcast after every accepted move.

use crate::board::Square;
use crate::game::{CastlingRights, Position};
use crate::pieces::{Color, Piece, PieceKind};
use crate::RulesError;

/// Standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Position {
    /// Parse a FEN string
    ///
    /// The halfmove and fullmove fields may be omitted and default to 0 and 1.
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 || fields.len() > 6 {
            return Err(invalid(format!("expected 4 to 6 fields, found {}", fields.len())));
        }

        let board = parse_placement(fields[0])?;
        let side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(invalid(format!("bad side to move {other:?}"))),
        };
        let castling = parse_castling(fields[2])?;
        let en_passant = parse_en_passant(fields[3], side_to_move)?;
        let halfmove_clock = parse_counter(fields.get(4).copied(), 0, "halfmove clock")?;
        let fullmove_number = parse_counter(fields.get(5).copied(), 1, "fullmove number")?;
        if fullmove_number == 0 {
            return Err(invalid("fullmove number must be positive".to_string()));
        }

        Ok(Position::from_parts(
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        ))
    }

    /// Encode as a full six-field FEN string
    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            repetition_key(self),
            self.halfmove_clock(),
            self.fullmove_number()
        )
    }
}

/// The first four FEN fields, which identify a position for repetition
pub(crate) fn repetition_key(position: &Position) -> String {
    let en_passant = position
        .en_passant()
        .map(|sq| sq.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} {} {}",
        placement(position),
        position.side_to_move().letter(),
        castling_field(position.castling()),
        en_passant
    )
}

fn placement(position: &Position) -> String {
    let mut out = String::with_capacity(72);
    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            match position.piece_at(Square::new(file, rank)) {
                Some(piece) => {
                    if empty > 0 {
                        out.push(char::from(b'0' + empty));
                        empty = 0;
                    }
                    out.push(piece.fen_letter());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push(char::from(b'0' + empty));
        }
        if rank > 0 {
            out.push('/');
        }
    }
    out
}

fn castling_field(rights: CastlingRights) -> String {
    let mut out = String::new();
    if rights.white_king_side {
        out.push('K');
    }
    if rights.white_queen_side {
        out.push('Q');
    }
    if rights.black_king_side {
        out.push('k');
    }
    if rights.black_queen_side {
        out.push('q');
    }
    if out.is_empty() {
        out.push('-');
    }
    out
}

fn parse_placement(field: &str) -> Result<[Option<Piece>; 64], RulesError> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(invalid(format!("expected 8 ranks, found {}", ranks.len())));
    }

    let mut board = [None; 64];
    for (row, text) in ranks.iter().enumerate() {
        let rank = 7 - row as u8;
        let mut file: u8 = 0;
        for c in text.chars() {
            if let Some(skip) = c.to_digit(10) {
                if !(1..=8).contains(&skip) {
                    return Err(invalid(format!("bad empty-square count {c:?}")));
                }
                file += skip as u8;
            } else {
                let piece = Piece::from_fen_letter(c)
                    .ok_or_else(|| invalid(format!("unknown piece letter {c:?}")))?;
                if file >= 8 {
                    return Err(invalid(format!("rank {} overflows", rank + 1)));
                }
                board[Square::new(file, rank).index()] = Some(piece);
                file += 1;
            }
            if file > 8 {
                return Err(invalid(format!("rank {} overflows", rank + 1)));
            }
        }
        if file != 8 {
            return Err(invalid(format!("rank {} has {} files", rank + 1, file)));
        }
    }

    for color in [Color::White, Color::Black] {
        let kings = board
            .iter()
            .filter(|p| **p == Some(Piece::new(PieceKind::King, color)))
            .count();
        if kings != 1 {
            return Err(invalid(format!("{color} must have exactly one king, found {kings}")));
        }
    }

    Ok(board)
}

fn parse_castling(field: &str) -> Result<CastlingRights, RulesError> {
    let mut rights = CastlingRights::default();
    if field == "-" {
        return Ok(rights);
    }
    for c in field.chars() {
        match c {
            'K' => rights.white_king_side = true,
            'Q' => rights.white_queen_side = true,
            'k' => rights.black_king_side = true,
            'q' => rights.black_queen_side = true,
            other => return Err(invalid(format!("bad castling flag {other:?}"))),
        }
    }
    Ok(rights)
}

fn parse_en_passant(field: &str, side_to_move: Color) -> Result<Option<Square>, RulesError> {
    if field == "-" {
        return Ok(None);
    }
    let square: Square = field
        .parse()
        .map_err(|_| invalid(format!("bad en passant square {field:?}")))?;
    // The target sits behind a pawn the opponent just pushed two ranks
    let expected_rank = match side_to_move {
        Color::White => 5,
        Color::Black => 2,
    };
    if square.rank() != expected_rank {
        return Err(invalid(format!("en passant square {field} on wrong rank")));
    }
    Ok(Some(square))
}

fn parse_counter(field: Option<&str>, default: u32, name: &str) -> Result<u32, RulesError> {
    match field {
        None => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|_| invalid(format!("bad {name} {text:?}"))),
    }
}

fn invalid(reason: String) -> RulesError {
    RulesError::InvalidFen(reason)
}

//! Board orientation and text rendering

use chessroom_core::board::FILES;
use chessroom_core::{Color, MoveRecord, Position, Square};

/// The 8x8 grid as drawn for a viewer, top row first
///
/// White sees rank 8 at the top with files a..h left to right. Black sees
/// the board turned around: rank 1 at the top, files h..a.
pub fn view_rows(perspective: Color) -> [[Square; 8]; 8] {
    let mut rows = [[Square::new(0, 0); 8]; 8];
    for (row, line) in rows.iter_mut().enumerate() {
        for (col, square) in line.iter_mut().enumerate() {
            let (file, rank) = match perspective {
                Color::White => (col, 7 - row),
                Color::Black => (7 - col, row),
            };
            *square = Square::new(file as u8, rank as u8);
        }
    }
    rows
}

/// Plain-text board with rank and file labels
///
/// Empty squares render as `.`, highlighted targets as `*`, and the
/// selected piece is bracketed.
pub fn render_board(
    board: &Position,
    perspective: Color,
    selection: Option<Square>,
    targets: &[Square],
) -> String {
    let rows = view_rows(perspective);
    let mut out = String::new();

    for line in &rows {
        out.push_str(&format!("{} ", line[0].rank() + 1));
        for &square in line {
            let cell = match board.piece_at(square) {
                Some(piece) if selection == Some(square) => format!("[{}]", piece.glyph()),
                Some(piece) if targets.contains(&square) => format!("*{}*", piece.glyph()),
                Some(piece) => format!(" {} ", piece.glyph()),
                None if targets.contains(&square) => " * ".to_string(),
                None => " . ".to_string(),
            };
            out.push_str(&cell);
        }
        out.push('\n');
    }

    out.push_str("  ");
    for square in &rows[0] {
        out.push_str(&format!(" {} ", FILES[square.file() as usize]));
    }
    out.push('\n');
    out
}

/// Move list as numbered pairs: `1. e4 e5`, `2. Nf3`
///
/// A list that opens with a black move starts `1... e5`.
pub fn history_lines(records: &[MoveRecord]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut number = 1;
    let mut open = false;

    for record in records {
        match record.color {
            Color::White => {
                lines.push(format!("{}. {}", number, record.san));
                open = true;
            }
            Color::Black if open => {
                if let Some(line) = lines.last_mut() {
                    line.push(' ');
                    line.push_str(&record.san);
                }
                open = false;
                number += 1;
            }
            Color::Black => {
                lines.push(format!("{}... {}", number, record.san));
                number += 1;
            }
        }
    }
    lines
}

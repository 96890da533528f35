//! Show command - print a position the way a client renders it

use anyhow::Result;
use clap::{Args, ValueEnum};

use chessroom_client::{advisory_targets, render_board, Role};
use chessroom_core::{Color, GameStatus, Position, Square, START_FEN};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

#[derive(Args)]
pub struct ShowArgs {
    /// Position to render
    #[arg(long, default_value = START_FEN)]
    pub fen: String,

    /// Side whose point of view is used
    #[arg(long = "as", value_enum, default_value = "white")]
    pub side: Side,

    /// Highlight the legal targets of the piece on this square
    #[arg(long)]
    pub select: Option<String>,
}

pub fn run(args: ShowArgs) -> Result<()> {
    print!("{}", render(&args)?);
    Ok(())
}

fn render(args: &ShowArgs) -> Result<String> {
    let board = Position::from_fen(&args.fen)?;
    let perspective = Color::from(args.side);

    let selection = args.select.as_deref().map(str::parse::<Square>).transpose()?;
    let targets = match selection {
        Some(square) => advisory_targets(&board, Role::Player(perspective), square),
        None => Vec::new(),
    };

    let mut out = render_board(&board, perspective, selection, &targets);
    out.push_str(&describe(&board));
    out.push('\n');
    Ok(out)
}

fn describe(board: &Position) -> String {
    match board.status() {
        GameStatus::Ongoing if board.in_check() => {
            format!("{} to move (Check)", board.side_to_move())
        }
        GameStatus::Ongoing => format!("{} to move", board.side_to_move()),
        other => other.describe().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(fen: &str, side: Side, select: Option<&str>) -> ShowArgs {
        ShowArgs {
            fen: fen.to_string(),
            side,
            select: select.map(str::to_string),
        }
    }

    #[test]
    fn test_render_start_from_white() {
        let text = render(&args(START_FEN, Side::White, None)).unwrap();
        assert!(text.starts_with("8 "));
        assert!(text.ends_with("White to move\n"));
    }

    #[test]
    fn test_render_from_black_with_selection() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let text = render(&args(fen, Side::Black, Some("g8"))).unwrap();
        assert!(text.starts_with("1 "));
        assert!(text.contains("[♞]"));
        assert_eq!(text.matches(" * ").count(), 2);
    }

    #[test]
    fn test_render_terminal_and_errors() {
        let mate = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let text = render(&args(mate, Side::White, None)).unwrap();
        assert!(text.ends_with("Checkmate! Black wins\n"));

        assert!(render(&args("nonsense", Side::White, None)).is_err());
        assert!(render(&args(START_FEN, Side::White, Some("z9"))).is_err());
    }
}

//! Client-side mirror of the shared session
//!
//! The mirror never applies moves on its own. The board only changes when a
//! `state-snapshot` arrives, which makes reloading idempotent and lets every
//! client converge on the server's position regardless of what it saw
//! before.

use crate::advisory::advisory_targets;
use crate::view;
use chessroom_core::clock::{format_clock, timeout_message};
use chessroom_core::{
    Clock, Color, GameStatus, MoveIntent, MoveRecord, PieceKind, Position, ServerEvent, Square,
    Urgency,
};
use serde::{Deserialize, Serialize};
use std::mem;

// ============================================================================
// CORE TYPES
// ============================================================================

/// What the server told this client it is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Unassigned,
    Player(Color),
    Spectator,
}

impl Role {
    /// Seat color, `None` for spectators and before assignment
    pub fn color(self) -> Option<Color> {
        match self {
            Role::Player(color) => Some(color),
            _ => None,
        }
    }
}

/// Captured pieces, grouped by the color of the piece taken
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captured {
    pub white: Vec<PieceKind>,
    pub black: Vec<PieceKind>,
}

impl Captured {
    pub fn of(&self, color: Color) -> &[PieceKind] {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn push(&mut self, color: Color, kind: PieceKind) {
        match color {
            Color::White => self.white.push(kind),
            Color::Black => self.black.push(kind),
        }
    }
}

/// Local view of the session for one connection
#[derive(Clone, Debug)]
pub struct ClientMirror {
    role: Role,
    board: Position,
    selection: Option<Square>,
    targets: Vec<Square>,
    history: Vec<MoveRecord>,
    captured: Captured,
    clock: Clock,
    ended: Option<String>,
    notices: Vec<String>,
}

impl Default for ClientMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMirror {
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            role: Role::Unassigned,
            board: Position::starting(),
            selection: None,
            targets: Vec::new(),
            history: Vec::new(),
            captured: Captured::default(),
            clock,
            ended: None,
            notices: Vec::new(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn board(&self) -> &Position {
        &self.board
    }

    pub fn selection(&self) -> Option<Square> {
        self.selection
    }

    /// Highlighted destinations for the current selection
    pub fn targets(&self) -> &[Square] {
        &self.targets
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn history_lines(&self) -> Vec<String> {
        view::history_lines(&self.history)
    }

    pub fn captured(&self) -> &Captured {
        &self.captured
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Terminal reason once the game is over
    pub fn ended(&self) -> Option<&str> {
        self.ended.as_deref()
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        mem::take(&mut self.notices)
    }

    /// Full moves played so far, at least 1
    pub fn move_number(&self) -> usize {
        self.history.len().div_ceil(2).max(1)
    }

    /// Orientation follows the seat; spectators see white's side
    pub fn perspective(&self) -> Color {
        self.role.color().unwrap_or(Color::White)
    }

    pub fn view_rows(&self) -> [[Square; 8]; 8] {
        view::view_rows(self.perspective())
    }

    /// Board with the opponent's clock above it and the viewer's below
    pub fn render(&self) -> String {
        let perspective = self.perspective();
        let mut out = self.clock_line(perspective.opponent());
        out.push('\n');
        out.push_str(&view::render_board(
            &self.board,
            perspective,
            self.selection,
            &self.targets,
        ));
        out.push_str(&self.clock_line(perspective));
        out.push('\n');
        out
    }

    /// `White 9:58`, marked `>` while counting down, `!` under two minutes
    /// and `!!` under thirty seconds
    pub fn clock_line(&self, color: Color) -> String {
        let marker = if self.clock.active() == Some(color) { "> " } else { "  " };
        let band = match self.clock.urgency(color) {
            Urgency::Normal => "",
            Urgency::Warning => " !",
            Urgency::Danger => " !!",
        };
        let remaining = format_clock(self.clock.remaining(color));
        format!("{marker}{color} {remaining}{band}")
    }

    /// The end reason once the game is over, otherwise
    /// `Turn: White (Check)`, `Checkmate! Black wins` or `Draw!`
    pub fn status_line(&self) -> String {
        if let Some(reason) = &self.ended {
            return reason.clone();
        }
        match self.board.status() {
            GameStatus::Checkmate { winner } => format!("Checkmate! {winner} wins"),
            GameStatus::Stalemate | GameStatus::Draw(_) => "Draw!".to_string(),
            GameStatus::Ongoing => {
                let mut line = format!("Turn: {}", self.board.side_to_move());
                if self.board.in_check() {
                    line.push_str(" (Check)");
                }
                line
            }
        }
    }

    // ========================================================================
    // RECONCILIATION
    // ========================================================================

    /// Fold one server event into the mirror
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RoleAssigned(color) => {
                self.role = Role::Player(color);
                self.clock.start();
            }
            ServerEvent::SpectatorAssigned => {
                self.role = Role::Spectator;
                self.notices
                    .push("You're a spectator. The board will update in real time.".to_string());
            }
            ServerEvent::MoveApplied(record) => {
                // Spectators have no seat, so their clock starts with play
                self.clock.start();
                if let Some(kind) = record.captured {
                    self.captured.push(record.color.opponent(), kind);
                }
                self.history.push(record);
                self.clear_selection();
            }
            ServerEvent::StateSnapshot(fen) => {
                match Position::from_fen(&fen) {
                    Ok(board) => self.board = board,
                    Err(err) => {
                        tracing::warn!(error = %err, "ignoring unreadable snapshot");
                        self.notices.push(format!("Unreadable position: {fen}"));
                    }
                }
                self.clear_selection();
            }
            ServerEvent::MoveRejected(payload) => {
                self.notices.push(format!("Invalid move: {payload}"));
            }
            ServerEvent::GameEnded(reason) => {
                self.clock.stop();
                self.ended = Some(reason);
            }
        }
    }

    /// Handle a click on `square`
    ///
    /// With nothing selected, selects one of the viewer's own pieces on its
    /// turn. With a selection active, clicking a highlighted target yields a
    /// move intent to send; the selection is dropped either way.
    pub fn click(&mut self, square: Square) -> Option<MoveIntent> {
        if let Some(from) = self.selection.take() {
            let targets = mem::take(&mut self.targets);
            if !targets.contains(&square) {
                return None;
            }
            let mut intent = MoveIntent::new(from.to_string(), square.to_string());
            if self.is_promotion(from, square) {
                intent = intent.with_promotion("q");
            }
            return Some(intent);
        }

        let Some(color) = self.role.color() else {
            return None;
        };
        if self.ended.is_some() || self.board.side_to_move() != color {
            return None;
        }
        if let Some(piece) = self.board.piece_at(square) {
            if piece.color == color {
                self.selection = Some(square);
                self.targets = advisory_targets(&self.board, self.role, square);
            }
        }
        None
    }

    /// One clock tick against the side to move
    ///
    /// Returns the timeout reason when this tick ran a side out of time.
    pub fn tick(&mut self) -> Option<String> {
        if self.ended.is_some() || self.board.status().is_terminal() {
            self.clock.stop();
            return None;
        }
        let flagged = self.clock.tick(self.board.side_to_move())?;
        let reason = timeout_message(flagged);
        self.ended = Some(reason.clone());
        Some(reason)
    }

    fn clear_selection(&mut self) {
        self.selection = None;
        self.targets.clear();
    }

    fn is_promotion(&self, from: Square, to: Square) -> bool {
        match self.board.piece_at(from) {
            Some(piece) => piece.kind == PieceKind::Pawn && to.rank() == piece.color.last_rank(),
            None => false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chessroom_core::clock::DEFAULT_TICK;
    use chessroom_core::START_FEN;
    use serde_json::json;
    use std::time::Duration;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn seated(color: Color, fen: &str) -> ClientMirror {
        let mut mirror = ClientMirror::new();
        mirror.apply(ServerEvent::RoleAssigned(color));
        mirror.apply(ServerEvent::StateSnapshot(fen.to_string()));
        mirror
    }

    #[test]
    fn test_role_assignment() {
        let mut mirror = ClientMirror::new();
        assert_eq!(mirror.role(), Role::Unassigned);
        mirror.apply(ServerEvent::RoleAssigned(Color::Black));
        assert_eq!(mirror.role(), Role::Player(Color::Black));
        assert!(mirror.clock().is_running());
        assert_eq!(mirror.perspective(), Color::Black);

        let mut watcher = ClientMirror::new();
        watcher.apply(ServerEvent::SpectatorAssigned);
        assert_eq!(watcher.role(), Role::Spectator);
        assert!(!watcher.clock().is_running());
        assert_eq!(watcher.perspective(), Color::White);
        assert_eq!(watcher.take_notices().len(), 1);
    }

    #[test]
    fn test_select_then_move() {
        let mut mirror = seated(Color::White, START_FEN);
        assert_eq!(mirror.click(sq("e2")), None);
        assert_eq!(mirror.selection(), Some(sq("e2")));
        assert_eq!(mirror.targets(), &[sq("e3"), sq("e4")]);

        let intent = mirror.click(sq("e4"));
        assert_eq!(intent, Some(MoveIntent::new("e2", "e4")));
        assert_eq!(mirror.selection(), None);
        assert!(mirror.targets().is_empty());
        // Nothing changes locally until the server answers
        assert_eq!(mirror.board().to_fen(), START_FEN);
    }

    #[test]
    fn test_click_off_target_clears_selection() {
        let mut mirror = seated(Color::White, START_FEN);
        mirror.click(sq("e2"));
        assert_eq!(mirror.click(sq("e5")), None);
        assert_eq!(mirror.selection(), None);
        assert!(mirror.targets().is_empty());
    }

    #[test]
    fn test_cannot_select_off_turn_or_opponent() {
        let mut black = seated(Color::Black, START_FEN);
        black.click(sq("e7"));
        assert_eq!(black.selection(), None);

        let mut white = seated(Color::White, START_FEN);
        white.click(sq("e7"));
        assert_eq!(white.selection(), None);

        let mut watcher = ClientMirror::new();
        watcher.apply(ServerEvent::SpectatorAssigned);
        watcher.click(sq("e2"));
        assert_eq!(watcher.selection(), None);
    }

    #[test]
    fn test_promotion_auto_fills_queen() {
        let mut mirror = seated(Color::Black, "4k3/8/8/8/8/8/3p4/K7 b - - 0 1");
        mirror.click(sq("d2"));
        let intent = mirror.click(sq("d1")).unwrap();
        assert_eq!(intent, MoveIntent::new("d2", "d1").with_promotion("q"));
    }

    #[test]
    fn test_move_applied_tracks_history_and_captures() {
        let mut mirror = seated(Color::White, START_FEN);
        mirror.click(sq("e2"));

        let record = MoveRecord {
            color: Color::White,
            from: sq("d4"),
            to: sq("e5"),
            piece: PieceKind::Pawn,
            captured: Some(PieceKind::Pawn),
            promotion: None,
            san: "dxe5".to_string(),
        };
        mirror.apply(ServerEvent::MoveApplied(record));

        assert_eq!(mirror.captured().of(Color::Black), &[PieceKind::Pawn]);
        assert!(mirror.captured().of(Color::White).is_empty());
        assert_eq!(mirror.history_lines(), ["1. dxe5"]);
        assert_eq!(mirror.selection(), None);
        // The board waits for the snapshot
        assert_eq!(mirror.board().to_fen(), START_FEN);
    }

    #[test]
    fn test_snapshot_reload_is_idempotent() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let mut mirror = seated(Color::White, fen);
        let once = mirror.board().to_fen();
        mirror.apply(ServerEvent::StateSnapshot(fen.to_string()));
        assert_eq!(mirror.board().to_fen(), once);
        assert_eq!(once, fen);
    }

    #[test]
    fn test_unreadable_snapshot_keeps_board() {
        let mut mirror = seated(Color::White, START_FEN);
        mirror.apply(ServerEvent::StateSnapshot("garbage".to_string()));
        assert_eq!(mirror.board().to_fen(), START_FEN);
        assert_eq!(mirror.notices().len(), 1);
    }

    #[test]
    fn test_rejection_becomes_notice() {
        let mut mirror = seated(Color::White, START_FEN);
        mirror.apply(ServerEvent::MoveRejected(json!({"from": "e2", "to": "e5"})));
        assert_eq!(
            mirror.take_notices(),
            [r#"Invalid move: {"from":"e2","to":"e5"}"#]
        );
        assert!(mirror.notices().is_empty());
    }

    #[test]
    fn test_status_line() {
        let mirror = seated(Color::White, START_FEN);
        assert_eq!(mirror.status_line(), "Turn: White");

        let check = seated(Color::White, "4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
        assert_eq!(check.status_line(), "Turn: White (Check)");

        let mate = seated(
            Color::White,
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        );
        assert_eq!(mate.status_line(), "Checkmate! Black wins");

        let stalemate = seated(Color::Black, "k7/2Q5/1K6/8/8/8/8/8 b - - 0 1");
        assert_eq!(stalemate.status_line(), "Draw!");
    }

    #[test]
    fn test_game_ended_stops_clock_and_selection() {
        let mut mirror = seated(Color::White, START_FEN);
        mirror.apply(ServerEvent::GameEnded("Black resigns. White wins".to_string()));
        assert_eq!(mirror.ended(), Some("Black resigns. White wins"));
        assert!(!mirror.clock().is_running());
        mirror.click(sq("e2"));
        assert_eq!(mirror.selection(), None);
    }

    #[test]
    fn test_status_line_shows_end_reason() {
        let mut mirror = seated(Color::White, START_FEN);
        assert_eq!(mirror.status_line(), "Turn: White");
        mirror.apply(ServerEvent::GameEnded("Black resigns. White wins".to_string()));
        assert_eq!(mirror.status_line(), "Black resigns. White wins");

        // Repetition is invisible to a mirror loaded from a snapshot
        let mut drawn = seated(Color::Black, START_FEN);
        drawn.apply(ServerEvent::GameEnded("Draw by threefold repetition".to_string()));
        assert_eq!(drawn.status_line(), "Draw by threefold repetition");
    }

    #[test]
    fn test_spectator_clock_starts_with_play() {
        let clock = Clock::new(Duration::from_secs(2), Duration::from_secs(1));
        let mut watcher = ClientMirror::with_clock(clock);
        watcher.apply(ServerEvent::SpectatorAssigned);
        watcher.apply(ServerEvent::StateSnapshot(START_FEN.to_string()));
        assert_eq!(watcher.tick(), None);
        assert_eq!(watcher.clock().remaining(Color::White), Duration::from_secs(2));

        watcher.apply(ServerEvent::MoveApplied(MoveRecord {
            color: Color::White,
            from: sq("e2"),
            to: sq("e4"),
            piece: PieceKind::Pawn,
            captured: None,
            promotion: None,
            san: "e4".to_string(),
        }));
        watcher.apply(ServerEvent::StateSnapshot(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string(),
        ));
        assert!(watcher.clock().is_running());
        assert_eq!(watcher.tick(), None);
        assert_eq!(watcher.tick(), Some("White wins on time!".to_string()));
        assert_eq!(watcher.status_line(), "White wins on time!");
    }

    #[test]
    fn test_clock_lines() {
        let clock = Clock::new(Duration::from_secs(121), Duration::from_secs(1));
        let mut mirror = ClientMirror::with_clock(clock);
        assert_eq!(mirror.clock_line(Color::White), "  White 2:01");

        mirror.apply(ServerEvent::RoleAssigned(Color::Black));
        mirror.apply(ServerEvent::StateSnapshot(START_FEN.to_string()));
        mirror.tick();
        assert_eq!(mirror.clock_line(Color::White), "> White 2:00 !");
        assert_eq!(mirror.clock_line(Color::Black), "  Black 2:01");

        let low = ClientMirror::with_clock(Clock::new(Duration::from_secs(30), DEFAULT_TICK));
        assert_eq!(low.clock_line(Color::Black), "  Black 0:30 !!");

        // Black sits at the bottom of its own board
        let text = mirror.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first(), Some(&"> White 2:00 !"));
        assert!(lines[1].starts_with("1 "));
        assert_eq!(lines.last(), Some(&"  Black 2:01"));
    }

    #[test]
    fn test_clock_runs_side_to_move_until_flag() {
        let clock = Clock::new(Duration::from_secs(2), Duration::from_secs(1));
        let mut mirror = ClientMirror::with_clock(clock);
        mirror.apply(ServerEvent::RoleAssigned(Color::White));
        mirror.apply(ServerEvent::StateSnapshot(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string(),
        ));

        assert_eq!(mirror.tick(), None);
        assert_eq!(mirror.clock().remaining(Color::Black), Duration::from_secs(1));
        assert_eq!(mirror.clock().remaining(Color::White), Duration::from_secs(2));
        assert_eq!(mirror.tick(), Some("White wins on time!".to_string()));
        assert_eq!(mirror.ended(), Some("White wins on time!"));
        assert_eq!(mirror.tick(), None);
    }

    #[test]
    fn test_clock_stops_on_decided_board() {
        let mut mirror = seated(
            Color::White,
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        );
        assert_eq!(mirror.tick(), None);
        assert!(!mirror.clock().is_running());
        assert_eq!(
            mirror.clock().remaining(Color::White),
            chessroom_core::clock::DEFAULT_BUDGET
        );
    }

    #[test]
    fn test_move_number() {
        let mut mirror = ClientMirror::new();
        assert_eq!(mirror.move_number(), 1);
        for (color, san) in [(Color::White, "e4"), (Color::Black, "e5"), (Color::White, "Nf3")] {
            mirror.apply(ServerEvent::MoveApplied(MoveRecord {
                color,
                from: sq("a1"),
                to: sq("a2"),
                piece: PieceKind::Pawn,
                captured: None,
                promotion: None,
                san: san.to_string(),
            }));
        }
        assert_eq!(mirror.move_number(), 2);
    }
}

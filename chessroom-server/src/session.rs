//! The authoritative game session
//!
//! `Session` is a synchronous state machine. Every operation returns the
//! deliveries the caller must perform instead of touching connections
//! itself, so the coordinator task stays the only place that does I/O.

use chessroom_core::clock::{format_clock, timeout_message};
use chessroom_core::{
    Clock, Color, GameStatus, MoveIntent, RulesEngine, RulesError, ServerEvent, Square,
    StandardChess,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

// ============================================================================
// TYPES
// ============================================================================

/// Identity of one live connection; never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An outbound event and who receives it
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    To(ConnectionId, ServerEvent),
    All(ServerEvent),
}

/// The two exclusive player seats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Seats {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
}

impl Seats {
    pub fn holder(&self, color: Color) -> Option<ConnectionId> {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn seat_of(&self, conn: ConnectionId) -> Option<Color> {
        if self.white == Some(conn) {
            Some(Color::White)
        } else if self.black == Some(conn) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    /// First free seat, white before black
    fn claim(&mut self, conn: ConnectionId) -> Option<Color> {
        if self.white.is_none() {
            self.white = Some(conn);
            Some(Color::White)
        } else if self.black.is_none() {
            self.black = Some(conn);
            Some(Color::Black)
        } else {
            None
        }
    }

    fn release(&mut self, conn: ConnectionId) -> Option<Color> {
        let color = self.seat_of(conn)?;
        match color {
            Color::White => self.white = None,
            Color::Black => self.black = None,
        }
        Some(color)
    }
}

/// Session lifecycle, computed from seats and the terminal reason
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    Terminal(String),
}

/// Clock readings as `m:ss`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    pub white: String,
    pub black: String,
    pub active: Option<Color>,
}

/// Read-only summary for the status endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub turn: Color,
    pub white_seated: bool,
    pub black_seated: bool,
    pub position: String,
    pub clock: Option<ClockReading>,
}

// ============================================================================
// SESSION
// ============================================================================

/// The single game session
pub struct Session<E: RulesEngine = StandardChess> {
    engine: E,
    board: E::Board,
    seats: Seats,
    ended: Option<String>,
    clock: Option<Clock>,
}

impl Session<StandardChess> {
    /// Standard chess from the starting position
    pub fn new() -> Self {
        Self::with_engine(StandardChess)
    }
}

impl Default for Session<StandardChess> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RulesEngine> Session<E> {
    pub fn with_engine(engine: E) -> Self {
        let board = engine.initial();
        Self {
            engine,
            board,
            seats: Seats::default(),
            ended: None,
            clock: None,
        }
    }

    /// Start from an encoded position instead of the initial one
    pub fn from_encoded(engine: E, encoded: &str) -> Result<Self, RulesError> {
        let board = engine.decode(encoded)?;
        let mut session = Self::with_engine(engine);
        session.board = board;
        if let Some(reason) = session.engine.status(&session.board).describe() {
            session.ended = Some(reason);
        }
        Ok(session)
    }

    /// Mirror per-color clocks server-side
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Side to move, always read from the board
    pub fn turn(&self) -> Color {
        self.engine.side_to_move(&self.board)
    }

    /// Canonical encoding of the current board
    pub fn snapshot(&self) -> String {
        self.engine.encode(&self.board)
    }

    pub fn seats(&self) -> Seats {
        self.seats
    }

    pub fn clock(&self) -> Option<&Clock> {
        self.clock.as_ref()
    }

    pub fn phase(&self) -> Phase {
        match &self.ended {
            Some(reason) => Phase::Terminal(reason.clone()),
            None if self.seats.is_full() => Phase::InProgress,
            None => Phase::WaitingForPlayers,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase(),
            turn: self.turn(),
            white_seated: self.seats.white.is_some(),
            black_seated: self.seats.black.is_some(),
            position: self.snapshot(),
            clock: self.clock.as_ref().map(|clock| ClockReading {
                white: format_clock(clock.remaining(Color::White)),
                black: format_clock(clock.remaining(Color::Black)),
                active: clock.active(),
            }),
        }
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// Seat or spectate a new connection and bring it up to date
    pub fn join(&mut self, conn: ConnectionId) -> Vec<Delivery> {
        let mut out = Vec::with_capacity(3);
        match self.seats.claim(conn) {
            Some(color) => {
                tracing::info!(%conn, ?color, "seat assigned");
                out.push(Delivery::To(conn, ServerEvent::RoleAssigned(color)));
            }
            None => {
                tracing::info!(%conn, "joined as spectator");
                out.push(Delivery::To(conn, ServerEvent::SpectatorAssigned));
            }
        }
        out.push(Delivery::To(conn, ServerEvent::StateSnapshot(self.snapshot())));
        if let Some(reason) = &self.ended {
            out.push(Delivery::To(conn, ServerEvent::GameEnded(reason.clone())));
        }

        if self.seats.is_full() && self.ended.is_none() {
            if let Some(clock) = &mut self.clock {
                clock.start();
            }
        }
        out
    }

    /// Free the seat held by a closing connection, if any
    pub fn leave(&mut self, conn: ConnectionId) -> Option<Color> {
        let freed = self.seats.release(conn);
        match freed {
            Some(color) => tracing::info!(%conn, ?color, "seat freed"),
            None => tracing::debug!(%conn, "spectator left"),
        }
        freed
    }

    /// Handle a move intent from `conn`
    ///
    /// Connections not holding the side-to-move's seat are ignored without a
    /// reply. Every other failure is answered with `move-rejected` to the
    /// submitter only.
    pub fn submit(&mut self, conn: ConnectionId, payload: &Value) -> Vec<Delivery> {
        let turn = self.turn();
        if self.seats.holder(turn) != Some(conn) {
            tracing::debug!(%conn, ?turn, "dropping move from connection without the turn");
            return Vec::new();
        }

        let rejected = || vec![Delivery::To(conn, ServerEvent::MoveRejected(payload.clone()))];

        if self.ended.is_some() {
            tracing::debug!(%conn, "move submitted after game end");
            return rejected();
        }

        let intent = match MoveIntent::from_payload(payload) {
            Ok(intent) => normalize_promotion(intent, turn),
            Err(err) => {
                tracing::debug!(%conn, error = %err, "malformed move payload");
                return rejected();
            }
        };

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.engine.apply(&self.board, &intent)));
        let (board, record) = match outcome {
            Ok(Ok(applied)) => applied,
            Ok(Err(err)) => {
                tracing::debug!(%conn, error = %err, "invalid move");
                return rejected();
            }
            Err(_) => {
                tracing::warn!(%conn, ?intent, "rules engine panicked, treating move as invalid");
                return rejected();
            }
        };

        tracing::info!(%conn, san = %record.san, "move applied");
        self.board = board;
        let mut out = vec![
            Delivery::All(ServerEvent::MoveApplied(record)),
            Delivery::All(ServerEvent::StateSnapshot(self.snapshot())),
        ];

        let status = panic::catch_unwind(AssertUnwindSafe(|| self.engine.status(&self.board)))
            .unwrap_or_else(|_| {
                tracing::warn!("rules engine panicked while reporting status");
                GameStatus::Ongoing
            });
        if let Some(reason) = status.describe() {
            out.push(self.finish(reason));
        }
        out
    }

    /// A seated player concedes
    pub fn resign(&mut self, conn: ConnectionId) -> Vec<Delivery> {
        let Some(color) = self.seats.seat_of(conn) else {
            tracing::debug!(%conn, "ignoring resignation from spectator");
            return Vec::new();
        };
        if self.ended.is_some() {
            return Vec::new();
        }
        vec![self.finish(format!("{color} resigns. {} wins", color.opponent()))]
    }

    /// Advance the server-side clock by one tick
    pub fn tick(&mut self) -> Vec<Delivery> {
        if self.phase() != Phase::InProgress {
            return Vec::new();
        }
        let turn = self.turn();
        let flagged = self.clock.as_mut().and_then(|clock| clock.tick(turn));
        match flagged {
            Some(color) => vec![self.finish(timeout_message(color))],
            None => Vec::new(),
        }
    }

    fn finish(&mut self, reason: String) -> Delivery {
        tracing::info!(%reason, "game over");
        if let Some(clock) = &mut self.clock {
            clock.stop();
        }
        self.ended = Some(reason.clone());
        Delivery::All(ServerEvent::GameEnded(reason))
    }
}

/// Drop a promotion unless the move goes from the mover's seventh rank to its last
pub fn normalize_promotion(mut intent: MoveIntent, mover: Color) -> MoveIntent {
    if intent.promotion.is_some() && !reaches_last_rank(&intent, mover) {
        intent.promotion = None;
    }
    intent
}

fn reaches_last_rank(intent: &MoveIntent, mover: Color) -> bool {
    let (Ok(from), Ok(to)) = (intent.from.parse::<Square>(), intent.to.parse::<Square>()) else {
        return false;
    };
    let seventh = (mover.last_rank() as i8 - mover.forward()) as u8;
    from.rank() == seventh && to.rank() == mover.last_rank()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chessroom_core::{MoveRecord, PieceKind, Position, START_FEN};
    use serde_json::json;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);
    const C: ConnectionId = ConnectionId(3);

    fn seated() -> Session {
        let mut session = Session::new();
        session.join(A);
        session.join(B);
        session
    }

    fn applied(deliveries: &[Delivery]) -> Option<&MoveRecord> {
        deliveries.iter().find_map(|d| match d {
            Delivery::All(ServerEvent::MoveApplied(record)) => Some(record),
            _ => None,
        })
    }

    fn snapshots(deliveries: &[Delivery]) -> Vec<&str> {
        deliveries
            .iter()
            .filter_map(|d| match d {
                Delivery::All(ServerEvent::StateSnapshot(fen)) => Some(fen.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_come_seating() {
        let mut session = Session::new();
        let a = session.join(A);
        assert_eq!(a[0], Delivery::To(A, ServerEvent::RoleAssigned(Color::White)));
        assert_eq!(a[1], Delivery::To(A, ServerEvent::StateSnapshot(START_FEN.to_string())));
        assert_eq!(session.phase(), Phase::WaitingForPlayers);

        let b = session.join(B);
        assert_eq!(b[0], Delivery::To(B, ServerEvent::RoleAssigned(Color::Black)));
        assert_eq!(session.phase(), Phase::InProgress);

        let c = session.join(C);
        assert_eq!(c[0], Delivery::To(C, ServerEvent::SpectatorAssigned));
        assert_eq!(session.seats().holder(Color::White), Some(A));
        assert_eq!(session.seats().holder(Color::Black), Some(B));
    }

    #[test]
    fn test_opening_exchange_and_replay() {
        let mut session = seated();

        let out = session.submit(A, &json!({"from": "e2", "to": "e4"}));
        assert_eq!(applied(&out).map(|r| r.san.as_str()), Some("e4"));
        assert_eq!(snapshots(&out).len(), 1);
        assert_eq!(session.turn(), Color::Black);

        let out = session.submit(B, &json!({"from": "e7", "to": "e5"}));
        assert_eq!(applied(&out).map(|r| r.san.as_str()), Some("e5"));

        // White's turn again, but e2 is empty now
        let before = session.snapshot();
        let payload = json!({"from": "e2", "to": "e4"});
        let out = session.submit(A, &payload);
        assert_eq!(out, vec![Delivery::To(A, ServerEvent::MoveRejected(payload))]);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_move_out_of_turn_is_dropped() {
        let mut session = seated();
        let out = session.submit(B, &json!({"from": "e7", "to": "e5"}));
        assert!(out.is_empty());
        assert_eq!(session.snapshot(), START_FEN);
    }

    #[test]
    fn test_spectator_moves_are_dropped() {
        let mut session = seated();
        session.join(C);
        assert!(session.submit(C, &json!({"from": "e2", "to": "e4"})).is_empty());
        assert_eq!(session.snapshot(), START_FEN);
    }

    #[test]
    fn test_single_seated_player_waits() {
        let mut session = Session::new();
        session.join(A);
        // White may move, black's seat is empty so black can never move
        assert!(applied(&session.submit(A, &json!({"from": "d2", "to": "d4"}))).is_some());
        assert!(session.submit(A, &json!({"from": "d7", "to": "d5"})).is_empty());
    }

    #[test]
    fn test_disconnect_frees_seat_for_next_arrival() {
        let mut session = seated();
        assert_eq!(session.leave(A), Some(Color::White));
        assert_eq!(session.phase(), Phase::WaitingForPlayers);
        assert_eq!(session.leave(C), None);

        let d = ConnectionId(4);
        let out = session.join(d);
        assert_eq!(out[0], Delivery::To(d, ServerEvent::RoleAssigned(Color::White)));
    }

    #[test]
    fn test_stale_move_after_disconnect_is_dropped() {
        let mut session = seated();
        session.leave(A);
        assert!(session.submit(A, &json!({"from": "e2", "to": "e4"})).is_empty());
        assert_eq!(session.snapshot(), START_FEN);
    }

    #[test]
    fn test_malformed_payload_rejected_to_submitter() {
        let mut session = seated();
        let payloads = [
            json!("e2e4"),
            json!({"from": 5}),
            json!({"from": "e2", "to": "x9"}),
            json!(null),
        ];
        for payload in payloads {
            let out = session.submit(A, &payload);
            assert_eq!(out, vec![Delivery::To(A, ServerEvent::MoveRejected(payload))]);
        }
        assert_eq!(session.snapshot(), START_FEN);
    }

    #[test]
    fn test_normalize_promotion() {
        let promote = |from: &str, to: &str, piece: &str, side: Color| {
            normalize_promotion(MoveIntent::new(from, to).with_promotion(piece), side).promotion
        };

        assert_eq!(promote("a7", "a8", "q", Color::White).as_deref(), Some("q"));
        assert_eq!(promote("h2", "g1", "n", Color::Black).as_deref(), Some("n"));
        assert_eq!(promote("e2", "e4", "q", Color::White), None);
        // Right destination, wrong origin
        assert_eq!(promote("a6", "a8", "q", Color::White), None);
        assert_eq!(promote("a7", "a8", "q", Color::Black), None);
    }

    #[test]
    fn test_stray_promotion_played_as_plain_move() {
        let mut session = seated();
        let out = session.submit(A, &json!({"from": "e2", "to": "e4", "promotion": "q"}));
        let record = applied(&out).unwrap();
        assert_eq!(record.promotion, None);
        assert_eq!(record.san, "e4");
    }

    #[test]
    fn test_promotion_to_queen() {
        let mut session =
            Session::from_encoded(StandardChess, "8/4P3/8/8/8/8/k7/4K3 w - - 0 1").unwrap();
        session.join(A);
        session.join(B);
        let out = session.submit(A, &json!({"from": "e7", "to": "e8", "promotion": "q"}));
        assert_eq!(applied(&out).unwrap().promotion, Some(PieceKind::Queen));
        assert_eq!(snapshots(&out), vec!["4Q3/8/8/8/8/8/k7/4K3 b - - 0 1"]);
    }

    #[test]
    fn test_checkmate_ends_session() {
        let mut session = seated();
        session.submit(A, &json!({"from": "f2", "to": "f3"}));
        session.submit(B, &json!({"from": "e7", "to": "e5"}));
        session.submit(A, &json!({"from": "g2", "to": "g4"}));
        let out = session.submit(B, &json!({"from": "d8", "to": "h4"}));

        assert_eq!(
            out.last(),
            Some(&Delivery::All(ServerEvent::GameEnded("Checkmate! Black wins".into())))
        );
        assert_eq!(session.phase(), Phase::Terminal("Checkmate! Black wins".into()));

        let payload = json!({"from": "a2", "to": "a3"});
        assert_eq!(
            session.submit(A, &payload),
            vec![Delivery::To(A, ServerEvent::MoveRejected(payload))]
        );
    }

    #[test]
    fn test_draw_ends_session_and_rejects_moves() {
        // White's king takes the last rook, leaving bare kings
        let mut session =
            Session::from_encoded(StandardChess, "8/8/4k3/8/8/8/3Kr3/8 w - - 0 1").unwrap();
        session.join(A);
        session.join(B);
        let out = session.submit(A, &json!({"from": "d2", "to": "e2"}));
        assert_eq!(applied(&out).map(|r| r.san.as_str()), Some("Kxe2"));
        assert_eq!(
            out.last(),
            Some(&Delivery::All(ServerEvent::GameEnded("Draw by insufficient material".into())))
        );

        let payload = json!({"from": "e6", "to": "e5"});
        assert_eq!(
            session.submit(B, &payload),
            vec![Delivery::To(B, ServerEvent::MoveRejected(payload))]
        );
    }

    #[test]
    fn test_resign() {
        let mut session = seated();
        session.join(C);
        assert!(session.resign(C).is_empty());
        let out = session.resign(B);
        assert_eq!(
            out,
            vec![Delivery::All(ServerEvent::GameEnded("Black resigns. White wins".into()))]
        );
        assert!(session.resign(A).is_empty());
    }

    #[test]
    fn test_late_joiner_sees_position_and_result() {
        let mut session = seated();
        session.submit(A, &json!({"from": "e2", "to": "e4"}));
        session.resign(A);
        let out = session.join(C);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], Delivery::To(C, ServerEvent::StateSnapshot(session.snapshot())));
        assert_eq!(
            out[2],
            Delivery::To(C, ServerEvent::GameEnded("White resigns. Black wins".into()))
        );
    }

    #[test]
    fn test_server_clock_flag_fall() {
        use std::time::Duration;
        let clock = Clock::new(Duration::from_secs(2), Duration::from_secs(1));
        let mut session = Session::new().with_clock(clock);
        session.join(A);
        // Not in progress yet, clock does not run
        assert!(session.tick().is_empty());
        session.join(B);
        assert!(session.tick().is_empty());
        let out = session.tick();
        assert_eq!(out, vec![Delivery::All(ServerEvent::GameEnded("Black wins on time!".into()))]);
        assert!(session.tick().is_empty());
        assert!(matches!(session.phase(), Phase::Terminal(_)));
    }

    #[test]
    fn test_clock_stops_on_checkmate() {
        use std::time::Duration;
        let clock = Clock::new(Duration::from_secs(60), Duration::from_secs(1));
        let mut session = Session::new().with_clock(clock);
        session.join(A);
        session.join(B);
        let moves = [(A, "f2", "f3"), (B, "e7", "e5"), (A, "g2", "g4"), (B, "d8", "h4")];
        for (conn, from, to) in moves {
            session.submit(conn, &json!({"from": from, "to": to}));
        }
        assert!(!session.clock().unwrap().is_running());
        assert!(session.tick().is_empty());
    }

    struct PanickingEngine;

    impl RulesEngine for PanickingEngine {
        type Board = Position;

        fn initial(&self) -> Position {
            Position::starting()
        }

        fn side_to_move(&self, board: &Position) -> Color {
            board.side_to_move()
        }

        fn apply(
            &self,
            _: &Position,
            _: &MoveIntent,
        ) -> Result<(Position, MoveRecord), RulesError> {
            panic!("engine failure")
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

    #[test]
    fn test_engine_panic_is_a_rejection() {
        let mut session = Session::with_engine(PanickingEngine);
        session.join(A);
        session.join(B);
        let payload = json!({"from": "e2", "to": "e4"});
        assert_eq!(
            session.submit(A, &payload),
            vec![Delivery::To(A, ServerEvent::MoveRejected(payload))]
        );
        assert_eq!(session.snapshot(), START_FEN);
    }
}

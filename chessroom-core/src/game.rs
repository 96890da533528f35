//! Position state and legal move generation

use crate::board::Square;
use crate::pieces::{Color, Piece, PieceKind, PROMOTION_KINDS};
use crate::wire::MoveRecord;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Halfmoves without pawn move or capture before the fifty-move draw
const FIFTY_MOVE_HALFMOVES: u32 = 100;

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

// ============================================================================
// CORE TYPES
// ============================================================================

/// Remaining castling rights
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub const fn all() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    pub fn king_side(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_king_side,
            Color::Black => self.black_king_side,
        }
    }

    pub fn queen_side(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_queen_side,
            Color::Black => self.black_queen_side,
        }
    }

    fn revoke(&mut self, color: Color) {
        self.revoke_king_side(color);
        self.revoke_queen_side(color);
    }

    fn revoke_king_side(&mut self, color: Color) {
        match color {
            Color::White => self.white_king_side = false,
            Color::Black => self.black_king_side = false,
        }
    }

    fn revoke_queen_side(&mut self, color: Color) {
        match color {
            Color::White => self.white_queen_side = false,
            Color::Black => self.black_queen_side = false,
        }
    }

    /// Drop rights whose rook corner was vacated or captured on
    fn touch(&mut self, square: Square) {
        match (square.file(), square.rank()) {
            (0, 0) => self.white_queen_side = false,
            (7, 0) => self.white_king_side = false,
            (0, 7) => self.black_queen_side = false,
            (7, 7) => self.black_king_side = false,
            _ => {}
        }
    }
}

/// Special move kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveFlag {
    Normal,
    DoublePush,
    EnPassant,
    CastleKingSide,
    CastleQueenSide,
}

/// A fully resolved legal move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub flag: MoveFlag,
}

/// Why a game was drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    FiftyMoveRule,
    InsufficientMaterial,
    ThreefoldRepetition,
}

/// Outcome of a position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }

    /// Human-readable end-of-game reason, `None` while ongoing
    pub fn describe(self) -> Option<String> {
        match self {
            GameStatus::Ongoing => None,
            GameStatus::Checkmate { winner } => Some(format!("Checkmate! {winner} wins")),
            GameStatus::Stalemate => Some("Draw by stalemate".to_string()),
            GameStatus::Draw(DrawReason::FiftyMoveRule) => {
                Some("Draw by fifty-move rule".to_string())
            }
            GameStatus::Draw(DrawReason::InsufficientMaterial) => {
                Some("Draw by insufficient material".to_string())
            }
            GameStatus::Draw(DrawReason::ThreefoldRepetition) => {
                Some("Draw by threefold repetition".to_string())
            }
        }
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// Full game position (clone to branch)
#[derive(Clone, Debug)]
pub struct Position {
    pub(crate) board: [Option<Piece>; 64],
    pub(crate) side_to_move: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,

    /// Repetition keys of every position reached, current one last
    seen: Vec<String>,
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

impl Position {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Standard starting position
    pub fn starting() -> Self {
        let mut board = [None; 64];
        for (file, &kind) in BACK_RANK.iter().enumerate() {
            let file = file as u8;
            board[Square::new(file, 0).index()] = Some(Piece::new(kind, Color::White));
            board[Square::new(file, 1).index()] = Some(Piece::new(PieceKind::Pawn, Color::White));
            board[Square::new(file, 6).index()] = Some(Piece::new(PieceKind::Pawn, Color::Black));
            board[Square::new(file, 7).index()] = Some(Piece::new(kind, Color::Black));
        }
        Self::from_parts(board, Color::White, CastlingRights::all(), None, 0, 1)
    }

    pub(crate) fn from_parts(
        board: [Option<Piece>; 64],
        side_to_move: Color,
        castling: CastlingRights,
        en_passant: Option<Square>,
        halfmove_clock: u32,
        fullmove_number: u32,
    ) -> Self {
        let mut position = Self {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
            seen: Vec::new(),
        };
        position.seen.push(position.repetition_key());
        position
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board[square.index()]
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Occupied squares in a1..h8 order
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.piece_at(sq).map(|piece| (sq, piece)))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, piece)| piece.kind == PieceKind::King && piece.color == color)
            .map(|(sq, _)| sq)
    }

    /// Is the side to move in check
    pub fn in_check(&self) -> bool {
        self.king_attacked(self.side_to_move)
    }

    fn king_attacked(&self, color: Color) -> bool {
        self.king_square(color)
            .is_some_and(|king| self.is_attacked(king, color.opponent()))
    }

    /// Does any piece of `by` attack `target`
    pub fn is_attacked(&self, target: Square, by: Color) -> bool {
        let holds = |sq: Option<Square>, kinds: &[PieceKind]| {
            sq.and_then(|sq| self.piece_at(sq))
                .is_some_and(|p| p.color == by && kinds.contains(&p.kind))
        };

        // Pawns attack diagonally forward, so look one rank behind the target
        let back = -by.forward();
        if holds(target.offset(-1, back), &[PieceKind::Pawn])
            || holds(target.offset(1, back), &[PieceKind::Pawn])
        {
            return true;
        }

        if KNIGHT_JUMPS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), &[PieceKind::Knight]))
        {
            return true;
        }

        if KING_STEPS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), &[PieceKind::King]))
        {
            return true;
        }

        let straight = [PieceKind::Rook, PieceKind::Queen];
        let diagonal = [PieceKind::Bishop, PieceKind::Queen];
        let slider = |dirs: &[(i8, i8)], kinds: &[PieceKind]| {
            dirs.iter().any(|&dir| {
                self.first_piece_along(target, dir)
                    .is_some_and(|p| p.color == by && kinds.contains(&p.kind))
            })
        };
        slider(&ROOK_DIRS, &straight) || slider(&BISHOP_DIRS, &diagonal)
    }

    fn first_piece_along(&self, from: Square, (df, dr): (i8, i8)) -> Option<Piece> {
        let mut current = from;
        while let Some(next) = current.offset(df, dr) {
            if let Some(piece) = self.piece_at(next) {
                return Some(piece);
            }
            current = next;
        }
        None
    }

    // ========================================================================
    // MOVE GENERATION
    // ========================================================================

    /// All legal moves for the side to move
    pub fn legal_moves(&self) -> Vec<Move> {
        let color = self.side_to_move;
        let mut moves = Vec::with_capacity(48);
        self.generate_pseudo_legal(&mut moves);
        let scratch = self.without_history();
        moves.retain(|mv| {
            let mut after = scratch.clone();
            after.apply_to_board(mv);
            !after.king_attacked(color)
        });
        moves
    }

    /// Same placement and rights, no repetition history
    fn without_history(&self) -> Self {
        Self {
            board: self.board,
            side_to_move: self.side_to_move,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
            seen: Vec::new(),
        }
    }

    /// Distinct destination squares of legal moves from `from`
    pub fn legal_targets(&self, from: Square) -> Vec<Square> {
        let mut targets: Vec<Square> = self
            .legal_moves()
            .into_iter()
            .filter(|mv| mv.from == from)
            .map(|mv| mv.to)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Resolve a from/to/promotion triple against the legal moves
    ///
    /// A promotion letter is only consulted for moves that promote, so a
    /// stray promotion on an ordinary move is ignored.
    pub fn find_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    ) -> Option<Move> {
        self.legal_moves().into_iter().find(|mv| {
            mv.from == from && mv.to == to && (mv.promotion.is_none() || mv.promotion == promotion)
        })
    }

    fn generate_pseudo_legal(&self, moves: &mut Vec<Move>) {
        let color = self.side_to_move;
        for (from, piece) in self.pieces().filter(|(_, p)| p.color == color) {
            match piece.kind {
                PieceKind::Pawn => self.generate_pawn_moves(from, moves),
                PieceKind::Knight => self.generate_steps(from, piece, &KNIGHT_JUMPS, moves),
                PieceKind::Bishop => self.generate_slides(from, piece, &BISHOP_DIRS, moves),
                PieceKind::Rook => self.generate_slides(from, piece, &ROOK_DIRS, moves),
                PieceKind::Queen => {
                    self.generate_slides(from, piece, &ROOK_DIRS, moves);
                    self.generate_slides(from, piece, &BISHOP_DIRS, moves);
                }
                PieceKind::King => {
                    self.generate_steps(from, piece, &KING_STEPS, moves);
                    self.generate_castling(from, moves);
                }
            }
        }
    }

    fn generate_pawn_moves(&self, from: Square, moves: &mut Vec<Move>) {
        let color = self.side_to_move;
        let forward = color.forward();
        let start_rank = if color == Color::White { 1 } else { 6 };

        if let Some(one) = from.offset(0, forward) {
            if self.piece_at(one).is_none() {
                push_pawn_move(from, one, None, color, moves);
                if from.rank() == start_rank {
                    if let Some(two) = from.offset(0, 2 * forward) {
                        if self.piece_at(two).is_none() {
                            moves.push(Move {
                                from,
                                to: two,
                                piece: PieceKind::Pawn,
                                captured: None,
                                promotion: None,
                                flag: MoveFlag::DoublePush,
                            });
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            let Some(target) = from.offset(df, forward) else {
                continue;
            };
            match self.piece_at(target) {
                Some(victim) if victim.color != color => {
                    push_pawn_move(from, target, Some(victim.kind), color, moves);
                }
                None if self.en_passant == Some(target) => moves.push(Move {
                    from,
                    to: target,
                    piece: PieceKind::Pawn,
                    captured: Some(PieceKind::Pawn),
                    promotion: None,
                    flag: MoveFlag::EnPassant,
                }),
                _ => {}
            }
        }
    }

    fn generate_steps(
        &self,
        from: Square,
        piece: Piece,
        steps: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(df, dr) in steps {
            let Some(to) = from.offset(df, dr) else {
                continue;
            };
            match self.piece_at(to) {
                Some(other) if other.color == piece.color => {}
                other => moves.push(Move {
                    from,
                    to,
                    piece: piece.kind,
                    captured: other.map(|p| p.kind),
                    promotion: None,
                    flag: MoveFlag::Normal,
                }),
            }
        }
    }

    fn generate_slides(
        &self,
        from: Square,
        piece: Piece,
        dirs: &[(i8, i8)],
        moves: &mut Vec<Move>,
    ) {
        for &(df, dr) in dirs {
            let mut current = from;
            while let Some(to) = current.offset(df, dr) {
                let occupant = self.piece_at(to);
                if occupant.is_some_and(|p| p.color == piece.color) {
                    break;
                }
                moves.push(Move {
                    from,
                    to,
                    piece: piece.kind,
                    captured: occupant.map(|p| p.kind),
                    promotion: None,
                    flag: MoveFlag::Normal,
                });
                if occupant.is_some() {
                    break;
                }
                current = to;
            }
        }
    }

    fn generate_castling(&self, from: Square, moves: &mut Vec<Move>) {
        let color = self.side_to_move;
        let rank = color.home_rank();
        if from != Square::new(4, rank) || self.king_attacked(color) {
            return;
        }
        let enemy = color.opponent();
        let own_rook = Some(Piece::new(PieceKind::Rook, color));
        let empty = |files: &[u8]| {
            files
                .iter()
                .all(|&f| self.piece_at(Square::new(f, rank)).is_none())
        };
        let safe = |files: &[u8]| {
            files
                .iter()
                .all(|&f| !self.is_attacked(Square::new(f, rank), enemy))
        };

        if self.castling.king_side(color)
            && self.piece_at(Square::new(7, rank)) == own_rook
            && empty(&[5, 6])
            && safe(&[5, 6])
        {
            moves.push(Move {
                from,
                to: Square::new(6, rank),
                piece: PieceKind::King,
                captured: None,
                promotion: None,
                flag: MoveFlag::CastleKingSide,
            });
        }

        if self.castling.queen_side(color)
            && self.piece_at(Square::new(0, rank)) == own_rook
            && empty(&[1, 2, 3])
            && safe(&[2, 3])
        {
            moves.push(Move {
                from,
                to: Square::new(2, rank),
                piece: PieceKind::King,
                captured: None,
                promotion: None,
                flag: MoveFlag::CastleQueenSide,
            });
        }
    }

    // ========================================================================
    // MOVE APPLICATION
    // ========================================================================

    /// Return the position after a legal move (the move is not re-validated)
    pub fn play(&self, mv: &Move) -> Self {
        let mut next = self.clone();
        next.apply_to_board(mv);
        next.seen.push(next.repetition_key());
        next
    }

    /// Describe a legal move for history and broadcast
    pub fn record(&self, mv: &Move) -> MoveRecord {
        MoveRecord {
            color: self.side_to_move,
            from: mv.from,
            to: mv.to,
            piece: mv.piece,
            captured: mv.captured,
            promotion: mv.promotion,
            san: crate::san::to_san(self, mv),
        }
    }

    fn apply_to_board(&mut self, mv: &Move) {
        let color = self.side_to_move;
        let rank = color.home_rank();

        self.board[mv.from.index()] = None;
        let placed = Piece::new(mv.promotion.unwrap_or(mv.piece), color);
        self.board[mv.to.index()] = Some(placed);

        match mv.flag {
            MoveFlag::EnPassant => {
                self.board[Square::new(mv.to.file(), mv.from.rank()).index()] = None;
            }
            MoveFlag::CastleKingSide => {
                self.board[Square::new(7, rank).index()] = None;
                self.board[Square::new(5, rank).index()] = Some(Piece::new(PieceKind::Rook, color));
            }
            MoveFlag::CastleQueenSide => {
                self.board[Square::new(0, rank).index()] = None;
                self.board[Square::new(3, rank).index()] = Some(Piece::new(PieceKind::Rook, color));
            }
            MoveFlag::Normal | MoveFlag::DoublePush => {}
        }

        if mv.piece == PieceKind::King {
            self.castling.revoke(color);
        }
        self.castling.touch(mv.from);
        self.castling.touch(mv.to);

        self.en_passant = match mv.flag {
            MoveFlag::DoublePush => {
                let rank = (mv.from.rank() + mv.to.rank()) / 2;
                Some(Square::new(mv.from.file(), rank))
            }
            _ => None,
        };

        if mv.piece == PieceKind::Pawn || mv.captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if color == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = color.opponent();
    }

    // ========================================================================
    // TERMINAL DETECTION
    // ========================================================================

    /// Checkmate, stalemate and draw detection for the side to move
    pub fn status(&self) -> GameStatus {
        if self.legal_moves().is_empty() {
            return if self.in_check() {
                GameStatus::Checkmate {
                    winner: self.side_to_move.opponent(),
                }
            } else {
                GameStatus::Stalemate
            };
        }
        if self.halfmove_clock >= FIFTY_MOVE_HALFMOVES {
            GameStatus::Draw(DrawReason::FiftyMoveRule)
        } else if self.insufficient_material() {
            GameStatus::Draw(DrawReason::InsufficientMaterial)
        } else if self.repetition_count() >= 3 {
            GameStatus::Draw(DrawReason::ThreefoldRepetition)
        } else {
            GameStatus::Ongoing
        }
    }

    /// Neither side can possibly deliver mate
    ///
    /// Covers bare kings, a single minor piece, and any number of bishops
    /// all standing on one square color.
    pub fn insufficient_material(&self) -> bool {
        let others: Vec<(Square, Piece)> = self
            .pieces()
            .filter(|(_, p)| p.kind != PieceKind::King)
            .collect();

        match others.as_slice() {
            [] => true,
            [(_, only)] => matches!(only.kind, PieceKind::Knight | PieceKind::Bishop),
            [(first, _), ..] => others.iter().all(|(sq, p)| {
                p.kind == PieceKind::Bishop && sq.is_light() == first.is_light()
            }),
        }
    }

    /// How many times the current position has occurred
    pub fn repetition_count(&self) -> usize {
        match self.seen.last() {
            Some(current) => self.seen.iter().filter(|key| *key == current).count(),
            None => 0,
        }
    }

    fn repetition_key(&self) -> String {
        crate::fen::repetition_key(self)
    }
}

fn push_pawn_move(
    from: Square,
    to: Square,
    captured: Option<PieceKind>,
    color: Color,
    moves: &mut Vec<Move>,
) {
    if to.rank() == color.last_rank() {
        for kind in PROMOTION_KINDS {
            moves.push(Move {
                from,
                to,
                piece: PieceKind::Pawn,
                captured,
                promotion: Some(kind),
                flag: MoveFlag::Normal,
            });
        }
    } else {
        moves.push(Move {
            from,
            to,
            piece: PieceKind::Pawn,
            captured,
            promotion: None,
            flag: MoveFlag::Normal,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

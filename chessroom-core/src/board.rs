//! Board geometry with 0x00..0x3f square indices (a1 = 0, h8 = 63)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RulesError;

/// File letters in board order
pub const FILES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// One of the 64 board squares
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square(u8);

impl Square {
    /// Build from zero-based file (a = 0) and rank (rank 1 = 0)
    pub const fn new(file: u8, rank: u8) -> Self {
        Self(rank * 8 + file)
    }

    /// Build from a raw index, `None` outside 0..64
    pub fn from_index(index: usize) -> Option<Self> {
        (index < 64).then(|| Self(index as u8))
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Zero-based file, a = 0
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Zero-based rank, rank 1 = 0
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Step by (file, rank) deltas, `None` when leaving the board
    pub fn offset(self, df: i8, dr: i8) -> Option<Self> {
        let file = self.file() as i8 + df;
        let rank = self.rank() as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Self::new(file as u8, rank as u8))
        } else {
            None
        }
    }

    /// Light squares have odd file + rank parity (h1 is light)
    pub fn is_light(self) -> bool {
        (self.file() + self.rank()) % 2 == 1
    }

    /// Iterate a1, b1, ..., h8
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", FILES[self.file() as usize], self.rank() + 1)
    }
}

impl FromStr for Square {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(RulesError::MalformedSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(RulesError::MalformedSquare(s.to_string()));
        }
        Ok(Square::new(file - b'a', rank - b'1'))
    }
}

impl TryFrom<String> for Square {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

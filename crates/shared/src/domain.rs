use std::{
    fmt,
    ops::{Index, IndexMut, Not},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of a standard Othello board.
pub const BOARD_WIDTH: usize = 8;
pub const BOARD_CELLS: usize = BOARD_WIDTH * BOARD_WIDTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Piece {
    Black,
    White,
}

impl Piece {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::White => "White",
        }
    }

    /// Board glyph: filled for Black, hollow for White.
    pub fn glyph(self) -> char {
        match self {
            Self::Black => '●',
            Self::White => '○',
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "Black" => Some(Self::Black),
            "White" => Some(Self::White),
            _ => None,
        }
    }
}

impl Not for Piece {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A board square addressed as (column, row). `x` is the column and `y` the
/// row everywhere on the wire, in previews and in placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "[u8; 2]")]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub fn new(x: u8, y: u8) -> Option<Self> {
        let width = BOARD_WIDTH as u8;
        (x < width && y < width).then_some(Self { x, y })
    }

    /// Row-major cell index: row `y`, column `x`.
    pub fn index(self) -> usize {
        self.y as usize * BOARD_WIDTH + self.x as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        (index < BOARD_CELLS).then(|| Self {
            x: (index % BOARD_WIDTH) as u8,
            y: (index / BOARD_WIDTH) as u8,
        })
    }
}

impl From<Coord> for [u8; 2] {
    fn from(value: Coord) -> Self {
        [value.x, value.y]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Local projection of the server's 8x8 board. Every cell is empty or holds
/// one piece; the length never changes.
#[derive(Clone, PartialEq, Eq)]
pub struct Board([Option<Piece>; BOARD_CELLS]);

impl Board {
    pub fn empty() -> Self {
        Self([None; BOARD_CELLS])
    }

    pub fn from_cells(cells: [Option<Piece>; BOARD_CELLS]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Option<Piece>; BOARD_CELLS] {
        &self.0
    }

    /// Cell at column `x`, row `y`. Out-of-range lookups return `None`.
    pub fn get(&self, x: u8, y: u8) -> Option<Piece> {
        Coord::new(x, y).and_then(|at| self[at])
    }

    pub fn count(&self, piece: Piece) -> usize {
        self.0.iter().filter(|cell| **cell == Some(piece)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Piece>]> {
        self.0.chunks(BOARD_WIDTH)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<Coord> for Board {
    type Output = Option<Piece>;

    fn index(&self, at: Coord) -> &Self::Output {
        &self.0[at.index()]
    }
}

impl IndexMut<Coord> for Board {
    fn index_mut(&mut self, at: Coord) -> &mut Self::Output {
        &mut self.0[at.index()]
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for cell in row {
                let c = cell.map_or('.', Piece::glyph);
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub Uuid);

impl FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque session credential issued by the server.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

//! Core domain types for banqi: colors, pieces, positions, cells and the board.

use derive_more::{Display, Error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};
use tracing::instrument;

/// Number of rows on the banqi board.
pub const ROWS: usize = 4;

/// Number of columns on the banqi board.
pub const COLUMNS: usize = 8;

/// Total number of pieces in a game (16 per color).
pub const TOTAL_PIECES: usize = 32;

// ─────────────────────────────────────────────────────────────
//  Pieces
// ─────────────────────────────────────────────────────────────

/// Side a piece belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Color {
    /// Red side.
    Red,
    /// Black side.
    Black,
}

impl Color {
    /// Returns the other color.
    pub fn opponent(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}

/// Type of a piece, ordered from strongest to weakest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PieceKind {
    /// King (general), rank 7.
    King,
    /// Guard (advisor), rank 6.
    Guard,
    /// Elephant (minister), rank 5.
    Elephant,
    /// Cart (chariot), rank 4.
    Cart,
    /// Horse, rank 3.
    Horse,
    /// Pawn (soldier), rank 2.
    Pawn,
    /// Cannon, rank 1.
    Cannon,
}

impl PieceKind {
    /// Capture rank; higher ranks may capture lower ones.
    pub fn rank(self) -> u8 {
        match self {
            PieceKind::King => 7,
            PieceKind::Guard => 6,
            PieceKind::Elephant => 5,
            PieceKind::Cart => 4,
            PieceKind::Horse => 3,
            PieceKind::Pawn => 2,
            PieceKind::Cannon => 1,
        }
    }

    /// How many pieces of this kind each color starts with.
    pub fn count_per_color(self) -> usize {
        match self {
            PieceKind::King => 1,
            PieceKind::Pawn => 5,
            PieceKind::Guard
            | PieceKind::Elephant
            | PieceKind::Cart
            | PieceKind::Horse
            | PieceKind::Cannon => 2,
        }
    }

    /// Single-letter board symbol.
    fn symbol(self) -> char {
        match self {
            PieceKind::King => 'k',
            PieceKind::Guard => 'g',
            PieceKind::Elephant => 'e',
            PieceKind::Cart => 'r',
            PieceKind::Horse => 'h',
            PieceKind::Pawn => 'p',
            PieceKind::Cannon => 'c',
        }
    }
}

/// A piece: a kind and a color. Pieces of the same class are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{color} {kind}")]
pub struct Piece {
    /// Piece type.
    #[serde(rename = "type")]
    pub kind: PieceKind,
    /// Piece color.
    pub color: Color,
}

impl Piece {
    /// Creates a piece.
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    /// Board symbol: uppercase for red, lowercase for black.
    pub fn symbol(self) -> char {
        match self.color {
            Color::Red => self.kind.symbol().to_ascii_uppercase(),
            Color::Black => self.kind.symbol(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Positions
// ─────────────────────────────────────────────────────────────

/// Coordinates that fall outside the 4×8 board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("Position out of bounds: row={row}, col={col}")]
pub struct PositionOutOfBounds {
    /// Requested row.
    pub row: i64,
    /// Requested column.
    pub col: i64,
}

/// A square on the board. Always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "RawPosition")]
#[display("({row}, {col})")]
pub struct Position {
    row: u8,
    col: u8,
}

/// Unchecked wire form of a position.
#[derive(Deserialize)]
struct RawPosition {
    row: i64,
    col: i64,
}

impl TryFrom<RawPosition> for Position {
    type Error = PositionOutOfBounds;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        Position::new(raw.row, raw.col).ok_or(PositionOutOfBounds {
            row: raw.row,
            col: raw.col,
        })
    }
}

impl Position {
    /// Creates a position, or `None` when `(row, col)` is off the board.
    pub fn new(row: i64, col: i64) -> Option<Self> {
        let in_rows = (0..ROWS as i64).contains(&row);
        let in_cols = (0..COLUMNS as i64).contains(&col);
        (in_rows && in_cols).then(|| Self {
            row: row as u8,
            col: col as u8,
        })
    }

    /// Row index (0-3).
    pub fn row(self) -> u8 {
        self.row
    }

    /// Column index (0-7).
    pub fn col(self) -> u8 {
        self.col
    }

    /// Manhattan distance to another square.
    pub fn distance(self, other: Position) -> u8 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    /// All 32 squares in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..ROWS as u8).flat_map(|row| (0..COLUMNS as u8).map(move |col| Position { row, col }))
    }
}

// ─────────────────────────────────────────────────────────────
//  Board
// ─────────────────────────────────────────────────────────────

/// A square on the banqi board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Cell {
    /// A face-down piece sits here.
    Unknown,
    /// Nothing here; only reachable once a revealed piece leaves.
    Empty,
    /// A revealed piece.
    #[serde(rename = "piece")]
    Occupied {
        /// The revealed piece.
        piece: Piece,
    },
}

impl Cell {
    /// Returns the revealed piece, if any.
    pub fn piece(self) -> Option<Piece> {
        match self {
            Cell::Occupied { piece } => Some(piece),
            Cell::Unknown | Cell::Empty => None,
        }
    }

    /// True when a piece physically sits here, revealed or not.
    pub fn is_screen(self) -> bool {
        !matches!(self, Cell::Empty)
    }
}

/// 4×8 banqi board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; COLUMNS]; ROWS],
}

impl Board {
    /// Creates the opening board: every square face down.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Unknown; COLUMNS]; ROWS],
        }
    }

    /// Gets the cell at a position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row as usize][pos.col as usize]
    }

    /// Sets the cell at a position.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row as usize][pos.col as usize] = cell;
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> &[[Cell; COLUMNS]; ROWS] {
        &self.cells
    }

    /// Revealed pieces currently on the board.
    pub fn revealed(&self) -> impl Iterator<Item = Piece> + '_ {
        self.cells.iter().flatten().filter_map(|cell| cell.piece())
    }

    /// Number of face-down squares.
    pub fn hidden_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| matches!(cell, Cell::Unknown))
            .count()
    }

    /// Formats the board as a human-readable grid.
    ///
    /// `?` is face down, `.` is empty, red pieces are uppercase.
    pub fn display(&self) -> String {
        let mut result = String::from("  ");
        for col in 0..COLUMNS {
            result.push_str(&format!(" {col}"));
        }
        for (row, cells) in self.cells.iter().enumerate() {
            result.push_str(&format!("\n{row} "));
            for cell in cells {
                let symbol = match cell {
                    Cell::Unknown => '?',
                    Cell::Empty => '.',
                    Cell::Occupied { piece } => piece.symbol(),
                };
                result.push(' ');
                result.push(symbol);
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────
//  Hidden pool
// ─────────────────────────────────────────────────────────────

/// Bag of pieces not yet revealed. Order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PiecePool {
    pieces: Vec<Piece>,
}

impl PiecePool {
    /// Creates the full 32-piece pool.
    #[instrument]
    pub fn full() -> Self {
        let pieces = Color::iter()
            .flat_map(|color| {
                PieceKind::iter().flat_map(move |kind| {
                    std::iter::repeat_n(Piece::new(kind, color), kind.count_per_color())
                })
            })
            .collect();
        Self { pieces }
    }

    /// Creates a pool holding exactly these pieces.
    pub fn from_pieces(pieces: Vec<Piece>) -> Self {
        Self { pieces }
    }

    /// Number of pieces left.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// True when nothing is left to reveal.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// How many pieces of this class are left.
    pub fn count(&self, piece: Piece) -> usize {
        self.pieces.iter().filter(|p| **p == piece).count()
    }

    /// Pieces left, in no particular order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Removes one piece of this class. Returns false if none is left.
    pub fn take(&mut self, piece: Piece) -> bool {
        match self.pieces.iter().position(|p| *p == piece) {
            Some(index) => {
                self.pieces.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Picks a piece uniformly at random without removing it.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Piece> {
        if self.pieces.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.pieces.len());
        Some(self.pieces[index])
    }
}

impl Default for PiecePool {
    fn default() -> Self {
        Self::full()
    }
}

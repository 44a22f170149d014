//! Board and lifecycle vocabulary shared by every payload.
//!
//! These types travel on the wire, so their serde representations are part
//! of the protocol contract: colors and statuses serialize as lowercase
//! strings, the grid as a 7-element array of 6-element column arrays.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of columns on the board.
pub const COLS: usize = 7;

/// Number of rows in each column. Row 0 is the top; discs fall toward the
/// larger row index.
pub const ROWS: usize = 6;

// ---------------------------------------------------------------------------
// CellColor
// ---------------------------------------------------------------------------

/// The occupancy of one board cell.
///
/// `neutral` is an empty cell. The first player admitted to a room plays
/// `red`; the second player (human or bot) plays `blue`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum CellColor {
    /// Empty cell.
    #[default]
    Neutral,
    /// The room creator's color.
    Red,
    /// The second player's (or bot's) color.
    Blue,
}

impl CellColor {
    /// Parses the wire representation (`"neutral"`, `"red"`, `"blue"`).
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "neutral" => Some(Self::Neutral),
            "red" => Some(Self::Red),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }

    /// Returns `true` for a disc color (anything but `Neutral`).
    pub fn is_disc(self) -> bool {
        self != Self::Neutral
    }

    /// The color on the other side of the board.
    ///
    /// `Neutral` has no opponent and maps to itself.
    pub fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
            Self::Neutral => Self::Neutral,
        }
    }
}

impl fmt::Display for CellColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Red => write!(f, "red"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// The 7×6 board, indexed `grid[col][row]` with row 0 at the top.
///
/// This is a newtype over a fixed-size array so the orientation is pinned
/// by the type itself: the outer index is always the column. Serializes as
/// the `grid_data` payload — seven arrays of six color strings.
///
/// Cells are only ever written through [`set`](Self::set); game rules
/// (gravity, turn order, win detection) live in the room layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid([[CellColor; ROWS]; COLS]);

impl Grid {
    /// Creates an empty board (all cells `neutral`).
    pub fn new() -> Self {
        Self([[CellColor::Neutral; ROWS]; COLS])
    }

    /// Returns the cell at `(col, row)`, or `None` out of bounds.
    pub fn cell(&self, col: usize, row: usize) -> Option<CellColor> {
        self.0.get(col).and_then(|c| c.get(row)).copied()
    }

    /// Writes `color` at `(col, row)`. Returns `false` out of bounds.
    ///
    /// No occupancy or gravity check here — callers validate first.
    pub fn set(&mut self, col: usize, row: usize, color: CellColor) -> bool {
        match self.0.get_mut(col).and_then(|c| c.get_mut(row)) {
            Some(cell) => {
                *cell = color;
                true
            }
            None => false,
        }
    }

    /// The lowest empty row in `col`: the largest row index still
    /// `neutral`, or `None` when the column is full (or out of bounds).
    pub fn lowest_empty_row(&self, col: usize) -> Option<usize> {
        let column = self.0.get(col)?;
        (0..ROWS).rev().find(|&row| column[row] == CellColor::Neutral)
    }

    /// Returns `true` when no column can accept another disc.
    pub fn is_full(&self) -> bool {
        (0..COLS).all(|col| self.lowest_empty_row(col).is_none())
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered — no skipping, no going back:
///
/// ```text
/// waiting → playing → finished
/// ```
///
/// - **waiting**: one player, accepting a second (human or, after the
///   join timer, the bot).
/// - **playing**: exactly two players, moves flowing.
/// - **finished**: someone won, drew, or forfeited. The room lingers
///   briefly so final notifications and stats writes flush, then every
///   index drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting a second player.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if the game is actively running.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing)
    }

    /// The next state in the strict ordering, or `None` at the end.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// OpponentType
// ---------------------------------------------------------------------------

/// Who sits on the other side of the board.
///
/// Set when the second player is admitted and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpponentType {
    Human,
    Bot,
}

impl fmt::Display for OpponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Bot => write!(f, "bot"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

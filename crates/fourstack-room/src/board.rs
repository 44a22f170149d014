//! Pure board rules: win detection and the bot's move policy.
//!
//! Everything here is a function of the grid alone — no room state, no
//! I/O — which is what makes the bot and the win scan unit-testable
//! without a server.

use fourstack_protocol::{CellColor, Grid, COLS, ROWS};
use rand::Rng;

/// Returns `true` if `color` has four consecutive cells in a column,
/// row, or either diagonal.
///
/// Scans the whole board for the one color; callers invoke it for the
/// color just placed, so a hit always involves the latest disc.
pub fn wins(grid: &Grid, color: CellColor) -> bool {
    let at = |col: usize, row: usize| grid.cell(col, row) == Some(color);

    // Vertical runs within a column.
    for col in 0..COLS {
        for row in 0..=(ROWS - 4) {
            if at(col, row) && at(col, row + 1) && at(col, row + 2) && at(col, row + 3) {
                return true;
            }
        }
    }

    // Horizontal runs across columns.
    for col in 0..=(COLS - 4) {
        for row in 0..ROWS {
            if at(col, row) && at(col + 1, row) && at(col + 2, row) && at(col + 3, row) {
                return true;
            }
        }
    }

    // Diagonal, row index increasing with column.
    for col in 0..=(COLS - 4) {
        for row in 0..=(ROWS - 4) {
            if at(col, row)
                && at(col + 1, row + 1)
                && at(col + 2, row + 2)
                && at(col + 3, row + 3)
            {
                return true;
            }
        }
    }

    // Diagonal, row index decreasing with column.
    for col in 0..=(COLS - 4) {
        for row in 3..ROWS {
            if at(col, row)
                && at(col + 1, row - 1)
                && at(col + 2, row - 2)
                && at(col + 3, row - 3)
            {
                return true;
            }
        }
    }

    false
}

/// Picks the bot's move, in strict priority order:
///
/// 1. *Win now*: the lowest-indexed column where dropping blue wins.
/// 2. *Block*: the lowest-indexed column where red would win next.
/// 3. *Random*: uniform over columns that still have room.
///
/// Returns the `(column, row)` landing cell, or `None` on a full board —
/// unreachable in practice because a filling move ends the game first.
pub fn bot_move(grid: &Grid) -> Option<(usize, usize)> {
    if let Some(cell) = winning_drop(grid, CellColor::Blue) {
        return Some(cell);
    }
    if let Some(cell) = winning_drop(grid, CellColor::Red) {
        return Some(cell);
    }

    let open: Vec<(usize, usize)> = (0..COLS)
        .filter_map(|col| grid.lowest_empty_row(col).map(|row| (col, row)))
        .collect();
    if open.is_empty() {
        return None;
    }
    Some(open[rand::rng().random_range(0..open.len())])
}

/// The first column (left to right) where dropping `color` completes
/// four in a row, with the landing row.
fn winning_drop(grid: &Grid, color: CellColor) -> Option<(usize, usize)> {
    for col in 0..COLS {
        if let Some(row) = grid.lowest_empty_row(col) {
            let mut probe = grid.clone();
            probe.set(col, row, color);
            if wins(&probe, color) {
                return Some((col, row));
            }
        }
    }
    None
}

// =========================================================================
// Tests
// =========================================================================

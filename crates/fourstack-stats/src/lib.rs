//! Player results store for Fourstack.
//!
//! The room layer reports terminal game outcomes through the narrow
//! [`StatsStore`] trait; this crate provides both backends:
//!
//! - [`PgStatsStore`] — PostgreSQL via `sqlx`, the production store.
//!   Win and draw settlements run inside a single transaction each.
//! - [`MemoryStatsStore`] — an in-process map with the same delta
//!   rules, used by tests and as the fallback when no `DATABASE_URL`
//!   is configured.
//!
//! Rating deltas are fixed: winner +25, loser −15 floored at 0, draw
//! +5 each. New players start at 1000.
//!
//! Store failures never reach game state — callers log and move on; a
//! finished game stays finished.

mod error;
mod memory;
mod postgres;

pub use error::StatsError;
pub use memory::MemoryStatsStore;
pub use postgres::PgStatsStore;

use serde::Serialize;

/// Rating points awarded to a winner.
pub const WIN_RATING_DELTA: i32 = 25;
/// Rating points taken from a loser (floored at 0).
pub const LOSS_RATING_DELTA: i32 = 15;
/// Rating points awarded to each side of a draw.
pub const DRAW_RATING_DELTA: i32 = 5;
/// Every player's starting rating.
pub const INITIAL_RATING: i32 = 1000;

/// One row of the `players` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRow {
    pub id: i32,
    pub username: String,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub rating: i32,
}

/// The port through which the room layer persists terminal outcomes.
///
/// All methods are idempotent per terminal event in the sense the
/// caller needs: `upsert` never clobbers existing stats, and the two
/// settlement calls are transactional — either both sides of a result
/// land or neither does.
#[async_trait::async_trait]
pub trait StatsStore: Send + Sync + 'static {
    /// Ensures a row exists for `username`; a no-op if one does.
    async fn upsert(&self, username: &str) -> Result<(), StatsError>;

    /// Atomically: winner +1 win, +25 rating; loser +1 loss, −15
    /// rating floored at 0.
    async fn apply_win(
        &self,
        winner: &str,
        loser: &str,
    ) -> Result<(), StatsError>;

    /// Atomically: each side +1 draw, +5 rating.
    async fn apply_draw(&self, a: &str, b: &str) -> Result<(), StatsError>;

    /// Top players by rating, descending. A non-positive `limit` means
    /// the default of 10.
    async fn leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<PlayerRow>, StatsError>;

    /// Looks up a player, creating the row first if absent.
    async fn player(&self, username: &str) -> Result<PlayerRow, StatsError>;
}

/// Sharing a store across owners (a server plus the test inspecting it)
/// is just wrapping it in an `Arc`.
#[async_trait::async_trait]
impl<S: StatsStore> StatsStore for std::sync::Arc<S> {
    async fn upsert(&self, username: &str) -> Result<(), StatsError> {
        (**self).upsert(username).await
    }

    async fn apply_win(
        &self,
        winner: &str,
        loser: &str,
    ) -> Result<(), StatsError> {
        (**self).apply_win(winner, loser).await
    }

    async fn apply_draw(&self, a: &str, b: &str) -> Result<(), StatsError> {
        (**self).apply_draw(a, b).await
    }

    async fn leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<PlayerRow>, StatsError> {
        (**self).leaderboard(limit).await
    }

    async fn player(&self, username: &str) -> Result<PlayerRow, StatsError> {
        (**self).player(username).await
    }
}

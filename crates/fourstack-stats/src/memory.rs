//! In-memory backend for the stats port.
//!
//! Applies the same delta rules as the PostgreSQL store, against a map.
//! Serves two jobs: the test double for settlement assertions, and the
//! runtime fallback when no `DATABASE_URL` is configured (results then
//! last only as long as the process).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    PlayerRow, StatsError, StatsStore, DRAW_RATING_DELTA, INITIAL_RATING,
    LOSS_RATING_DELTA, WIN_RATING_DELTA,
};

#[derive(Default)]
struct Inner {
    players: HashMap<String, PlayerRow>,
    next_id: i32,
}

impl Inner {
    fn upsert(&mut self, username: &str) -> &mut PlayerRow {
        if !self.players.contains_key(username) {
            self.next_id += 1;
            self.players.insert(
                username.to_string(),
                PlayerRow {
                    id: self.next_id,
                    username: username.to_string(),
                    wins: 0,
                    losses: 0,
                    draws: 0,
                    rating: INITIAL_RATING,
                },
            );
        }
        self.players.get_mut(username).expect("just inserted")
    }
}

/// Map-backed [`StatsStore`].
#[derive(Default)]
pub struct MemoryStatsStore {
    inner: Mutex<Inner>,
}

impl MemoryStatsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current row for a player, if one exists. Test hook — the trait's
    /// [`player`](StatsStore::player) creates missing rows instead.
    pub fn get(&self, username: &str) -> Option<PlayerRow> {
        self.lock().players.get(username).cloned()
    }
}

#[async_trait::async_trait]
impl StatsStore for MemoryStatsStore {
    async fn upsert(&self, username: &str) -> Result<(), StatsError> {
        self.lock().upsert(username);
        Ok(())
    }

    async fn apply_win(
        &self,
        winner: &str,
        loser: &str,
    ) -> Result<(), StatsError> {
        let mut inner = self.lock();
        {
            let row = inner.upsert(winner);
            row.wins += 1;
            row.rating += WIN_RATING_DELTA;
        }
        {
            let row = inner.upsert(loser);
            row.losses += 1;
            row.rating = (row.rating - LOSS_RATING_DELTA).max(0);
        }
        Ok(())
    }

    async fn apply_draw(&self, a: &str, b: &str) -> Result<(), StatsError> {
        let mut inner = self.lock();
        for username in [a, b] {
            let row = inner.upsert(username);
            row.draws += 1;
            row.rating += DRAW_RATING_DELTA;
        }
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<PlayerRow>, StatsError> {
        let limit = if limit <= 0 { 10 } else { limit } as usize;
        let mut rows: Vec<PlayerRow> =
            self.lock().players.values().cloned().collect();
        rows.sort_by(|a, b| b.rating.cmp(&a.rating));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn player(&self, username: &str) -> Result<PlayerRow, StatsError> {
        Ok(self.lock().upsert(username).clone())
    }
}

// =========================================================================
// Tests
// =========================================================================

//! PostgreSQL backend for the stats port, via `sqlx`.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{PlayerRow, StatsError, StatsStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id SERIAL PRIMARY KEY,
    username VARCHAR(255) UNIQUE NOT NULL,
    wins INTEGER DEFAULT 0,
    losses INTEGER DEFAULT 0,
    draws INTEGER DEFAULT 0,
    rating INTEGER DEFAULT 1000,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const PLAYER_COLUMNS: &str =
    "id, username, wins, losses, draws, rating";

/// The production stats store: a pooled PostgreSQL connection.
///
/// Cheap to clone — `PgPool` is an `Arc` internally — so the server
/// hands clones to whichever task settles a game.
#[derive(Clone)]
pub struct PgStatsStore {
    pool: PgPool,
}

impl PgStatsStore {
    /// Connects to the database and ensures the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StatsError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("stats store connected");
        Ok(Self { pool })
    }
}

fn player_from_row(row: &PgRow) -> Result<PlayerRow, sqlx::Error> {
    Ok(PlayerRow {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        wins: row.try_get("wins")?,
        losses: row.try_get("losses")?,
        draws: row.try_get("draws")?,
        rating: row.try_get("rating")?,
    })
}

#[async_trait::async_trait]
impl StatsStore for PgStatsStore {
    async fn upsert(&self, username: &str) -> Result<(), StatsError> {
        sqlx::query(
            "INSERT INTO players (username) VALUES ($1)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_win(
        &self,
        winner: &str,
        loser: &str,
    ) -> Result<(), StatsError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE players
             SET wins = wins + 1, rating = rating + 25,
                 updated_at = CURRENT_TIMESTAMP
             WHERE username = $1",
        )
        .bind(winner)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE players
             SET losses = losses + 1, rating = GREATEST(rating - 15, 0),
                 updated_at = CURRENT_TIMESTAMP
             WHERE username = $1",
        )
        .bind(loser)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(%winner, %loser, "win recorded");
        Ok(())
    }

    async fn apply_draw(&self, a: &str, b: &str) -> Result<(), StatsError> {
        let mut tx = self.pool.begin().await?;
        for username in [a, b] {
            sqlx::query(
                "UPDATE players
                 SET draws = draws + 1, rating = rating + 5,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE username = $1",
            )
            .bind(username)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(player_a = %a, player_b = %b, "draw recorded");
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<PlayerRow>, StatsError> {
        let limit = if limit <= 0 { 10 } else { limit };
        let rows = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players
             ORDER BY rating DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| player_from_row(row).map_err(StatsError::from))
            .collect()
    }

    async fn player(&self, username: &str) -> Result<PlayerRow, StatsError> {
        self.upsert(username).await?;
        let row = sqlx::query(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(player_from_row(&row)?),
            None => Err(StatsError::NotFound(username.to_string())),
        }
    }
}

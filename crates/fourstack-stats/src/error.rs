//! Error types for the stats layer.

/// Errors that can occur while persisting or reading player results.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// The underlying store failed (connection, query, transaction).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No row exists for this player.
    #[error("player {0} not found")]
    NotFound(String),
}

//! Unified error type for the server crate.

use fourstack_stats::StatsError;
use fourstack_transport::TransportError;

/// Top-level error for building and running a server.
///
/// Per-operation failures (bad moves, unknown rooms, duplicate
/// usernames) never surface here — they are answered on the wire and
/// the connection keeps going. This type covers what can actually stop
/// the server: the listener and the stats store.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level failure (bind, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A stats-store failure during startup.
    #[error(transparent)]
    Stats(#[from] StatsError),
}

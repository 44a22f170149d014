//! # Fourstack
//!
//! A realtime two-player Connect-Four server over WebSockets.
//!
//! Fourstack brokers matchmaking between players, owns the
//! authoritative game state for each match, drives a fallback computer
//! opponent when no human shows up within the join window, tolerates
//! transient network drops with a bounded reconnection grace, and
//! persists aggregate player results to PostgreSQL.
//!
//! Everything lives in one [`Server`] value constructed at startup —
//! no process-wide singletons — so tests instantiate isolated servers
//! on ephemeral ports.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use fourstack::{ServerBuilder, ServerConfig};
//! use fourstack_stats::MemoryStatsStore;
//!
//! # async fn run() -> Result<(), fourstack::ServerError> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .config(ServerConfig::default())
//!     .build(MemoryStatsStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod matchmaker;
mod server;
mod timers;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::{Server, ServerBuilder};

/// Re-exports everything needed to embed or test the server.
pub mod prelude {
    pub use crate::{Server, ServerBuilder, ServerConfig, ServerError};

    pub use fourstack_protocol::{
        CellColor, ClientRequest, Grid, OpponentType, RoomStatus,
        ServerFrame,
    };
    pub use fourstack_registry::ClientRegistry;
    pub use fourstack_room::{Room, RoomDirectory, BOT_USERNAME};
    pub use fourstack_stats::{
        MemoryStatsStore, PgStatsStore, PlayerRow, StatsStore,
    };
    pub use fourstack_transport::WsListener;
}

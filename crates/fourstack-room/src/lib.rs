//! Room layer for Fourstack: the authoritative game state.
//!
//! This crate owns everything that makes a match a match:
//!
//! - [`Room`] — the per-match state machine (players, grid, turn,
//!   disconnect bookkeeping, winner), serialized behind its own mutex.
//! - [`board`] — the pure rules: win detection and the bot's move policy.
//! - [`RoomDirectory`] — the partitioned index of rooms by lifecycle
//!   stage, which matchmaking pops from and timers re-check against.
//!
//! The room layer performs no network I/O of its own. Mutators deliver
//! frames through the per-client channels handed in at admission, and
//! every terminal transition is reported back to the caller as a
//! [`Settlement`] so stats writes happen outside the room lock.

pub mod board;
mod directory;
mod error;
mod room;

pub use directory::RoomDirectory;
pub use error::RoomError;
pub use room::{
    DisconnectOutcome, GraceOutcome, MoveOutcome, RejoinOutcome, Room,
    Settlement, StartInfo, BOT_USERNAME,
};

//! Wire protocol for Fourstack.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Game types** ([`CellColor`], [`Grid`], [`RoomStatus`], [`OpponentType`]) —
//!   the board and lifecycle vocabulary that appears in payloads.
//! - **Frames** ([`ClientFrame`], [`ClientRequest`], [`ServerFrame`]) — the
//!   tagged JSON messages that travel on the wire, plus [`encode`] /
//!   [`decode_client`] helpers.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and the
//! session/room layers (player identity, game state). It doesn't know about
//! connections or rooms — it only knows how messages are shaped.
//!
//! ```text
//! Transport (text) → Protocol (frames) → Orchestrator (dispatch)
//! ```

mod error;
mod frames;
mod types;

pub use error::ProtocolError;
pub use frames::{
    decode_client, encode, ClientFrame, ClientRequest, GameStartPayload,
    GameUpdatePayload, MoveRequest, ReconnectRequest, RoomSummary,
    ServerFrame,
};
pub use types::{CellColor, Grid, OpponentType, RoomStatus, COLS, ROWS};

//! The tagged JSON frames that travel on the wire.
//!
//! Client → server frames look like:
//!
//! ```text
//! { "type": "game_update", "username": "alice", "data": { ... } }
//! ```
//!
//! Server → client frames look like:
//!
//! ```text
//! { "type": "game_update", "data": { ... } }
//! ```
//!
//! The two directions decode differently on purpose. [`ServerFrame`] is an
//! adjacently-tagged enum — the server controls what it emits, so a strict
//! shape is fine. Inbound frames go through the permissive [`ClientFrame`]
//! first: an unknown `type` or a malformed `data` object must never kill
//! the read loop, it becomes a per-field `None` or
//! [`ClientRequest::Unknown`] that the orchestrator logs and answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CellColor, Grid, OpponentType, ProtocolError, RoomStatus};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// The raw envelope of an inbound message.
///
/// Every field except `type` is optional on the wire; missing fields
/// surface as defaults so validation can happen per-operation with the
/// right error string, not as a blanket decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Message discriminator (`new_game`, `game_update`, `reconnect`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// The sender's claimed identity. The orchestrator ignores this in
    /// favor of the username bound at upgrade time.
    #[serde(default)]
    pub username: String,

    /// Operation-specific payload, refined by [`ClientRequest::from_frame`].
    #[serde(default)]
    pub data: Value,
}

/// A decoded, dispatchable client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Enter matchmaking.
    NewGame,
    /// Place a disc (a `game_update` frame with `action = "place_disc"`).
    GameUpdate(MoveRequest),
    /// Attempt to rejoin a room after a disconnect.
    Reconnect(ReconnectRequest),
    /// Anything else — logged and ignored.
    Unknown(String),
}

impl ClientRequest {
    /// Refines a raw frame into a dispatchable request.
    pub fn from_frame(frame: &ClientFrame) -> Self {
        match frame.kind.as_str() {
            "new_game" => Self::NewGame,
            "game_update" => Self::GameUpdate(MoveRequest::from_value(&frame.data)),
            "reconnect" => Self::Reconnect(ReconnectRequest::from_value(&frame.data)),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The fields of a `game_update` payload, each independently optional.
///
/// Extraction is field-by-field rather than a derived struct so that one
/// bad field (say, `"column": "three"`) doesn't mask the fields that did
/// arrive — the room layer checks them in protocol order and picks the
/// error string for the first one missing.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub room_id: Option<String>,
    pub action: Option<String>,
    pub column: Option<usize>,
    pub row: Option<usize>,
    pub player_color: Option<CellColor>,
}

impl MoveRequest {
    /// Extracts the move fields from a raw `data` object.
    pub fn from_value(data: &Value) -> Self {
        Self {
            room_id: string_field(data, "room_id"),
            action: string_field(data, "action"),
            column: index_field(data, "column"),
            row: index_field(data, "row"),
            player_color: data
                .get("player_color")
                .and_then(Value::as_str)
                .and_then(CellColor::from_wire),
        }
    }
}

/// The fields of a `reconnect` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectRequest {
    pub room_id: Option<String>,
}

impl ReconnectRequest {
    /// Extracts the reconnect fields from a raw `data` object.
    pub fn from_value(data: &Value) -> Self {
        Self {
            room_id: string_field(data, "room_id"),
        }
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn index_field(data: &Value, key: &str) -> Option<usize> {
    data.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every message the server can emit.
///
/// `#[serde(tag = "type", content = "data")]` produces the adjacently
/// tagged wire shape: `{ "type": "game_started", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Reply to `new_game` when a fresh waiting room was created.
    NewGameResponse(RoomSummary),

    /// Sent to the second human admitted into a waiting room, before the
    /// `game_started` fan-out.
    GameJoined(RoomSummary),

    /// The room reached two players; personalized per recipient with
    /// their color assignment.
    GameStarted(GameStartPayload),

    /// Full snapshot for a player who rejoined within the grace window.
    GameRejoined(GameStartPayload),

    /// The opponent dropped; they have the grace window to come back.
    PlayerDisconnected { username: String, message: String },

    /// The opponent made it back within the grace window.
    PlayerRejoined { username: String },

    /// Board state after any mutation; carries `winner` once finished.
    GameUpdate(GameUpdatePayload),

    /// Advisory notice (e.g. a previous game being terminated).
    Info { info: String },

    /// A rejected operation; the connection stays open.
    Error { error: String },
}

impl ServerFrame {
    /// Shorthand for an `info` frame.
    pub fn info(info: impl Into<String>) -> Self {
        Self::Info { info: info.into() }
    }

    /// Shorthand for an `error` frame.
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

/// Room snapshot without color assignments (`new_game_response`,
/// `game_joined`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub status: RoomStatus,
    pub current_turn: String,
    pub total_players: usize,
    pub players: Vec<String>,
    pub grid_data: Grid,
}

/// Room snapshot personalized with the recipient's seat
/// (`game_started`, `game_rejoined`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartPayload {
    pub room_id: String,
    pub status: RoomStatus,
    pub opponent_type: OpponentType,
    pub current_turn: String,
    pub total_players: usize,
    pub players: Vec<String>,
    pub grid_data: Grid,
    pub player_username: String,
    pub player_color: CellColor,
    pub opponent_color: CellColor,
    pub opponent_username: String,
}

/// Board state broadcast (`game_update`).
///
/// `winner` appears exactly when `status` is `finished` — an empty string
/// means the game drew. `message` carries the occasional human-readable
/// note (forfeits, reconnection timeouts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUpdatePayload {
    pub room_id: String,
    pub status: RoomStatus,
    pub current_turn: String,
    pub grid_data: Grid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Serializes a server frame to JSON text.
pub fn encode(frame: &ServerFrame) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(ProtocolError::Encode)
}

/// Parses an inbound message into the raw client envelope.
pub fn decode_client(text: &str) -> Result<ClientFrame, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

// =========================================================================
// Tests
// =========================================================================

//! Error types for the room layer.
//!
//! The `Display` strings double as the wire `error` payloads, so they are
//! part of the protocol contract — change one and every client breaks.

/// Errors that can occur during room operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The `room_id` field was missing or not a string.
    #[error("Invalid room ID")]
    InvalidRoomId,

    /// No room with this id exists (or it already finished and was
    /// purged).
    #[error("Room not found")]
    NotFound,

    /// The move came from the player whose turn it isn't — or before
    /// the game started.
    #[error("Not your turn")]
    NotYourTurn,

    /// A `game_update` whose `action` isn't `place_disc`.
    #[error("Invalid action")]
    InvalidAction,

    /// Missing or out-of-range column/row, a non-disc color, a color
    /// that isn't the mover's, or a cell that's already occupied.
    #[error("Invalid column or row or color")]
    InvalidPlacement,

    /// A `reconnect` from a player the room isn't holding a seat for.
    #[error("You were not disconnected from this room")]
    NotDisconnected,

    /// The grace window had already closed when the rejoin arrived.
    #[error("You failed to reconnect within the time limit. The game is over.")]
    ReconnectExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_strings_match_wire_contract() {
        assert_eq!(RoomError::InvalidRoomId.to_string(), "Invalid room ID");
        assert_eq!(RoomError::NotFound.to_string(), "Room not found");
        assert_eq!(RoomError::NotYourTurn.to_string(), "Not your turn");
        assert_eq!(
            RoomError::InvalidPlacement.to_string(),
            "Invalid column or row or color"
        );
        assert_eq!(
            RoomError::NotDisconnected.to_string(),
            "You were not disconnected from this room"
        );
        assert_eq!(
            RoomError::ReconnectExpired.to_string(),
            "You failed to reconnect within the time limit. The game is over."
        );
    }
}

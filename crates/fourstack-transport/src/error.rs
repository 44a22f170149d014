//! Error types for the transport layer.

use tokio_tungstenite::tungstenite::http::StatusCode;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

/// Why an HTTP upgrade was refused before the WebSocket handshake.
///
/// The `Display` strings are the HTTP response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The request path wasn't `/ws`.
    #[error("Not found")]
    UnknownPath,

    /// No `username` query parameter (or an empty one).
    #[error("Username is required")]
    MissingUsername,

    /// Another live connection already owns this username and it isn't
    /// sitting in a playing room's disconnected set.
    #[error("Username already in use")]
    UsernameInUse,
}

impl Rejection {
    /// The HTTP status to answer with.
    pub fn status(self) -> StatusCode {
        match self {
            Self::UnknownPath => StatusCode::NOT_FOUND,
            Self::MissingUsername => StatusCode::BAD_REQUEST,
            Self::UsernameInUse => StatusCode::CONFLICT,
        }
    }
}

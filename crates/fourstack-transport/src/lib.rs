//! WebSocket transport for Fourstack.
//!
//! This crate owns the two edges of a client connection:
//!
//! - **Inbound**: [`WsListener`] accepts HTTP upgrades on `/ws`, enforcing
//!   the `username` query parameter and the duplicate-identity check
//!   *before* the 101 response (a rejected client sees a plain HTTP 400 or
//!   409, never a WebSocket close).
//! - **Outbound**: every accepted client gets an unbounded frame channel
//!   ([`ClientSender`]) drained by a dedicated writer task. The channel is
//!   the serialization point for writes — any layer holding a sender can
//!   deliver without touching the socket, and ordering within one client
//!   is the channel's FIFO order.

mod error;
mod websocket;

pub use error::{Rejection, TransportError};
pub use websocket::{AcceptedClient, FrameReceiver, WsListener};

use std::fmt;

use fourstack_protocol::ServerFrame;
use tokio::sync::mpsc;

/// Handle for delivering frames to one client.
///
/// Cloneable and non-blocking; sends to a client whose writer has died
/// are silently dropped (`let _ = tx.send(..)`), and the orchestrator
/// discovers the dead transport on its next read.
pub type ClientSender = mpsc::UnboundedSender<ServerFrame>;

/// Decides during the HTTP upgrade whether a username may connect.
///
/// Implemented by the server over its registry and room state. The check
/// runs inside the synchronous upgrade callback, so implementations must
/// not block or await.
pub trait AdmissionPolicy: Send + Sync {
    /// Returns `Ok(())` to admit, or the [`Rejection`] to turn into an
    /// HTTP error status.
    fn admit(&self, username: &str) -> Result<(), Rejection>;
}

/// Opaque identifier for a connection, unique for the process lifetime.
///
/// A newtype over `u64` so a connection id can't be confused with any
/// other counter, and usable as a map key in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

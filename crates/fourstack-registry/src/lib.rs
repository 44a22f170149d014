//! Live-connection registry for Fourstack.
//!
//! This crate answers one question for the whole server: *is this
//! username busy, and where?* It tracks:
//!
//! 1. **Identity** — which username owns which live connection
//!    (and the inverse, connection → username, for teardown)
//! 2. **Location** — which room a username is currently playing in,
//!    a binding that deliberately outlives transient disconnects
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← registers on upgrade, drops on read-loop exit
//!     ↕
//! Registry (this crate) ← single authority on username liveness
//!     ↕
//! Transport (below)     ← provides ConnectionId and ClientSender
//! ```

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{ClientHandle, ClientRegistry};

//! Error types for the registry layer.

/// Errors that can occur while admitting a connection.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Another live connection already owns this username, and the
    /// reconnection exception (disconnected from a playing room, grace
    /// still open) doesn't apply.
    #[error("username {0} already has a live connection")]
    UsernameInUse(String),
}

//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire frames.
///
/// The inner `serde_json::Error` is preserved so logs show the exact
/// position and cause of a malformed message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into JSON text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning JSON text into a frame).
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a
    /// truncated message.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

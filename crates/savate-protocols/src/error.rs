//! Error types for savate-protocols.

use thiserror::Error;

/// Result type for savate-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Inbound frames that could not be turned into a message. These are logged
/// and dropped by the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// The line is not a JSON envelope at all.
    #[error("invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// A well-formed envelope with a `type` outside the known set.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A known `type` whose `data` does not match its payload.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownMessageType(_))
    }
}

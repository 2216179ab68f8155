//! Error types for savate-node.

use thiserror::Error;

/// Result type for savate-node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in node operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected input: bad access form, illegal score, bad configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Registration or link failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Frame that could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] savate_protocols::Error),

    /// Informational no-op: nothing to undo, no judges to reset.
    #[error("State error: {0}")]
    State(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<savate_session::Error> for Error {
    fn from(e: savate_session::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<savate_scoring::Error> for Error {
    fn from(e: savate_scoring::Error) -> Self {
        match e {
            savate_scoring::Error::Rule(violation) => Error::Validation(violation.to_string()),
            savate_scoring::Error::NothingToUndo => Error::State(e.to_string()),
        }
    }
}

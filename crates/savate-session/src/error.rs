//! Error types for savate-session.

use std::fmt;

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A user-supplied field that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AccessCode,
    JudgeName,
    JudgeNumber,
    JudgeCount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessCode => write!(f, "access code"),
            Self::JudgeName => write!(f, "judge name"),
            Self::JudgeNumber => write!(f, "judge number"),
            Self::JudgeCount => write!(f, "judge count"),
        }
    }
}

/// One rejected field and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
    pub field: Field,
    pub reason: &'static str,
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

/// Errors that can occur while creating or joining a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// One or more fields were rejected. Every offending field is listed.
    #[error("validation failed: {}", join_invalid(.0))]
    Validation(Vec<Invalid>),

    /// A fight type string did not match any known category.
    #[error("unknown fight type: {0}")]
    UnknownFightType(String),

    /// A peer address did not follow `delegate_<code>` / `judge_<id>_<code>`.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Fields named by a validation failure (empty for other variants).
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Self::Validation(invalid) => invalid.iter().map(|i| i.field).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_invalid(invalid: &[Invalid]) -> String {
    invalid
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

//! Scoring errors

use thiserror::Error;

use crate::corner::Corner;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an entry event was refused. The record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("round {round} is out of range (1..={round_count})")]
    RoundOutOfRange { round: u8, round_count: u8 },

    #[error("score {0} is not one of 1, 2, 3")]
    InvalidScore(u8),

    #[error("bonus {0} is not 0 or 1")]
    InvalidBonus(u8),

    #[error("round {round}: both fighters cannot score 3")]
    BothMaximum { round: u8 },

    #[error("round {round}: {red}-{blue} is not a legal score pair")]
    IllegalPair { round: u8, red: u8, blue: u8 },

    #[error("{rejected} cannot take a bonus while {} holds one", rejected.opposite())]
    BothBonuses { rejected: Corner },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("rule violation: {0}")]
    Rule(#[from] RuleViolation),

    #[error("nothing to undo")]
    NothingToUndo,
}

impl Error {
    /// True for the informational no-op kind.
    pub fn is_state(&self) -> bool {
        matches!(self, Self::NothingToUndo)
    }
}

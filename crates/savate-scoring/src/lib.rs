//! Savate Scoring - Per-Judge Rules & Majority Aggregation
//!
//! Each judge device runs a [`ScoringEngine`] over its own [`JudgeRecord`].
//! The delegate never scores: it keeps the last record received from every
//! judge and folds the connected ones into a [`Recap`].
//!
//! # Rules
//!
//! - A round is scored 1, 2 or 3 per corner. Never 3-3; a complete round is
//!   one of 3-2, 2-3, 3-1, 1-3, 2-2.
//! - Warnings deduct one point per flagged round. Standing counts do the same
//!   under the combat ruleset only.
//! - A single bonus point may go to one corner.
//! - An abandoned corner's total is 0.
//!
//! The majority counts votes, not points: a judge's decision text says who
//! won, and the side with more judges wins the bout.

pub mod aggregate;
pub mod corner;
pub mod decision;
pub mod engine;
pub mod error;
pub mod history;
pub mod record;

pub use aggregate::{FinalDecision, JudgeLine, JudgeRound, Recap, RoundRecap, Tally};
pub use corner::{Corner, PerCorner};
pub use decision::{decision_name, result_name, Decision, Vote};
pub use engine::{check_pair, Outcome, Rules, ScoringEngine, LEGAL_PAIRS};
pub use error::{Error, Result, RuleViolation};
pub use history::{DelegateAction, History, HISTORY_CAPACITY};
pub use record::{JudgeRecord, RoundScore, Scorecard, Totals};

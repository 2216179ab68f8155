//! The judge record: one judge's scorecard plus everything derived from it.
//!
//! The record is the single source of truth for a judge. The judge's own
//! engine mutates it, `judge_data` carries it verbatim to the delegate, and
//! the delegate keeps the last snapshot it received per judge id.

use std::collections::BTreeSet;

use savate_session::{JudgeId, JudgeProfile, Ruleset};
use serde::{Deserialize, Serialize};

use crate::corner::{Corner, PerCorner};

/// Scores entered for one round. `None` means not yet entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScore {
    pub red: Option<u8>,
    pub blue: Option<u8>,
}

impl RoundScore {
    pub fn get(&self, corner: Corner) -> Option<u8> {
        match corner {
            Corner::Red => self.red,
            Corner::Blue => self.blue,
        }
    }

    pub fn set(&mut self, corner: Corner, value: Option<u8>) {
        match corner {
            Corner::Red => self.red = value,
            Corner::Blue => self.blue = value,
        }
    }
}

/// Judge inputs. This is also the undo snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    /// Index 0 is round 1.
    pub scores: Vec<RoundScore>,
    pub warnings: PerCorner<BTreeSet<u8>>,
    pub counts: PerCorner<BTreeSet<u8>>,
    pub abandon: PerCorner<bool>,
    pub bonus: PerCorner<u8>,
}

impl Scorecard {
    pub fn blank(round_count: u8) -> Self {
        Self {
            scores: vec![RoundScore::default(); round_count as usize],
            ..Self::default()
        }
    }

    pub fn round(&self, round: u8) -> Option<&RoundScore> {
        round
            .checked_sub(1)
            .and_then(|index| self.scores.get(index as usize))
    }

    /// Nothing has been entered yet.
    pub fn is_blank(&self) -> bool {
        self.scores.iter().all(|s| s.red.is_none() && s.blue.is_none())
            && self.warnings.red.is_empty()
            && self.warnings.blue.is_empty()
            && self.counts.red.is_empty()
            && self.counts.blue.is_empty()
            && !self.abandon.red
            && !self.abandon.blue
            && self.bonus.red == 0
            && self.bonus.blue == 0
    }

    /// Resize to a new round count, keeping the rounds that still exist.
    pub fn fit_rounds(&mut self, round_count: u8) {
        self.scores.resize(round_count as usize, RoundScore::default());
        for set in [
            &mut self.warnings.red,
            &mut self.warnings.blue,
            &mut self.counts.red,
            &mut self.counts.blue,
        ] {
            set.retain(|round| (1..=round_count).contains(round));
        }
    }
}

/// Values derived from a scorecard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal1: PerCorner<i32>,
    pub warning_tally: PerCorner<i32>,
    pub count_tally: PerCorner<i32>,
    pub subtotal2: PerCorner<i32>,
    pub total: PerCorner<i32>,
}

impl Totals {
    /// Derive the totals for rounds `1..=round_count`.
    ///
    /// Standing counts only deduct under the combat ruleset. An abandoned
    /// corner's total is forced to 0.
    pub fn compute(card: &Scorecard, round_count: u8, ruleset: Ruleset) -> Self {
        let mut totals = Self::default();
        for corner in Corner::BOTH {
            let subtotal1: i32 = (1..=round_count)
                .filter_map(|round| card.round(round))
                .filter_map(|score| score.get(corner))
                .map(i32::from)
                .sum();
            let in_range = |rounds: &BTreeSet<u8>| {
                rounds.iter().filter(|r| (1..=round_count).contains(*r)).count() as i32
            };
            let warning_tally = in_range(&card.warnings[corner]);
            let count_tally = match ruleset {
                Ruleset::Combat => in_range(&card.counts[corner]),
                Ruleset::Assault => 0,
            };
            let subtotal2 = subtotal1 - warning_tally - count_tally;

            totals.subtotal1[corner] = subtotal1;
            totals.warning_tally[corner] = warning_tally;
            totals.count_tally[corner] = count_tally;
            totals.subtotal2[corner] = subtotal2;
            totals.total[corner] = if card.abandon[corner] {
                0
            } else {
                subtotal2 + i32::from(card.bonus[corner])
            };
        }
        totals
    }
}

/// A judge's full record, as held by the judge and mirrored by the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRecord {
    pub id: JudgeId,
    pub name: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_link_id: Option<String>,
    pub connected: bool,
    pub last_update_time: u64,
    #[serde(flatten)]
    pub card: Scorecard,
    #[serde(flatten)]
    pub totals: Totals,
    pub decision: String,
}

impl JudgeRecord {
    pub fn new(profile: &JudgeProfile, round_count: u8) -> Self {
        Self {
            id: profile.id,
            name: profile.name.clone(),
            number: profile.number.clone(),
            peer_link_id: None,
            connected: true,
            last_update_time: 0,
            card: Scorecard::blank(round_count),
            totals: Totals::default(),
            decision: crate::decision::Decision::Pending.to_string(),
        }
    }

    /// Clear every score-related field in place. Identity and link are kept.
    pub fn clear_scores(&mut self) {
        let round_count = self.card.scores.len();
        self.card = Scorecard {
            scores: vec![RoundScore::default(); round_count],
            ..Scorecard::default()
        };
        self.totals = Totals::default();
        self.decision = crate::decision::Decision::Pending.to_string();
    }

    pub fn profile(&self) -> JudgeProfile {
        JudgeProfile {
            id: self.id,
            name: self.name.clone(),
            number: self.number.clone(),
        }
    }
}

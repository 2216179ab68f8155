//! Per-judge scoring engine.
//!
//! Every entry event is validated before anything changes. An accepted event
//! pushes the previous scorecard onto the undo history, applies the change
//! and re-derives totals and decision. The caller propagates the record.

use savate_session::{now_millis, FightType, Fighters, JudgeProfile, Ruleset};
use tracing::debug;

use crate::corner::{Corner, PerCorner};
use crate::decision::Decision;
use crate::error::{Error, Result, RuleViolation};
use crate::history::History;
use crate::record::{JudgeRecord, Scorecard, Totals};

/// Legal score pairs for a fully entered round, as (red, blue).
pub const LEGAL_PAIRS: [(u8, u8); 5] = [(3, 2), (2, 3), (3, 1), (1, 3), (2, 2)];

/// Round count and ruleset the engine scores under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub round_count: u8,
    pub ruleset: Ruleset,
}

impl Rules {
    pub fn new(round_count: u8, ruleset: Ruleset) -> Self {
        Self {
            round_count,
            ruleset,
        }
    }

    pub fn for_fight(fight_type: FightType) -> Self {
        Self::new(fight_type.round_count(), fight_type.ruleset())
    }
}

/// Whether an event changed the record (and so must be propagated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Changed,
    Unchanged,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// Check a round's pair. Either side may still be empty.
pub fn check_pair(round: u8, red: Option<u8>, blue: Option<u8>) -> std::result::Result<(), RuleViolation> {
    match (red, blue) {
        (Some(3), Some(3)) => Err(RuleViolation::BothMaximum { round }),
        (Some(red), Some(blue)) if !LEGAL_PAIRS.contains(&(red, blue)) => {
            Err(RuleViolation::IllegalPair { round, red, blue })
        }
        _ => Ok(()),
    }
}

pub struct ScoringEngine {
    rules: Rules,
    fighters: Fighters,
    record: JudgeRecord,
    history: History<Scorecard>,
}

impl ScoringEngine {
    pub fn new(profile: &JudgeProfile, rules: Rules) -> Self {
        let mut engine = Self {
            rules,
            fighters: Fighters::default(),
            record: JudgeRecord::new(profile, rules.round_count),
            history: History::default(),
        };
        engine.recompute();
        engine
    }

    pub fn record(&self) -> &JudgeRecord {
        &self.record
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn fighters(&self) -> &Fighters {
        &self.fighters
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Enter or clear (`None`) one corner's score for a round.
    pub fn set_score(&mut self, round: u8, corner: Corner, value: Option<u8>) -> Result<Outcome> {
        self.check_round(round)?;
        if let Some(v) = value {
            if !(1..=3).contains(&v) {
                return self.reject(RuleViolation::InvalidScore(v));
            }
        }

        let current = self.record.card.round(round).copied().unwrap_or_default();
        if current.get(corner) == value {
            return Ok(Outcome::Unchanged);
        }
        let mut next = current;
        next.set(corner, value);
        if let Err(violation) = check_pair(round, next.red, next.blue) {
            return self.reject(violation);
        }

        let mut card = self.record.card.clone();
        card.scores[(round - 1) as usize] = next;
        Ok(self.commit(card))
    }

    pub fn toggle_warning(&mut self, corner: Corner, round: u8) -> Result<Outcome> {
        self.check_round(round)?;
        let mut card = self.record.card.clone();
        toggle(&mut card.warnings[corner], round);
        Ok(self.commit(card))
    }

    /// Standing counts exist only under the combat ruleset; a no-op otherwise.
    pub fn toggle_count(&mut self, corner: Corner, round: u8) -> Result<Outcome> {
        self.check_round(round)?;
        if self.rules.ruleset != Ruleset::Combat {
            debug!(%corner, round, "standing count ignored outside combat");
            return Ok(Outcome::Unchanged);
        }
        let mut card = self.record.card.clone();
        toggle(&mut card.counts[corner], round);
        Ok(self.commit(card))
    }

    pub fn toggle_abandon(&mut self, corner: Corner) -> Outcome {
        let mut card = self.record.card.clone();
        card.abandon[corner] = !card.abandon[corner];
        self.commit(card)
    }

    /// Set a corner's bonus to 0 or 1. Only one corner may hold a bonus.
    pub fn set_bonus(&mut self, corner: Corner, value: u8) -> Result<Outcome> {
        if value > 1 {
            return self.reject(RuleViolation::InvalidBonus(value));
        }
        if value > 0 && self.record.card.bonus[corner.opposite()] > 0 {
            return self.reject(RuleViolation::BothBonuses { rejected: corner });
        }
        if self.record.card.bonus[corner] == value {
            return Ok(Outcome::Unchanged);
        }
        let mut card = self.record.card.clone();
        card.bonus[corner] = value;
        Ok(self.commit(card))
    }

    /// Restore the scorecard as it was before the last accepted event.
    pub fn undo(&mut self) -> Result<()> {
        let previous = self.history.pop().ok_or(Error::NothingToUndo)?;
        self.record.card = previous;
        self.record.card.fit_rounds(self.rules.round_count);
        self.stamp();
        Ok(())
    }

    /// Blank scorecard, empty history. Identity and link are kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.record.clear_scores();
        self.record.card.fit_rounds(self.rules.round_count);
        self.stamp();
    }

    /// Names only appear in the decision text, so this re-derives it.
    pub fn set_fighters(&mut self, fighters: Fighters) -> Outcome {
        if self.fighters == fighters {
            return Outcome::Unchanged;
        }
        self.fighters = fighters;
        let before = self.record.decision.clone();
        self.recompute();
        if self.record.decision == before {
            Outcome::Unchanged
        } else {
            Outcome::Changed
        }
    }

    /// Switch round count or ruleset. Entered rounds that still exist are
    /// kept; the undo history is dropped since its snapshots no longer fit.
    pub fn set_rules(&mut self, rules: Rules) -> Outcome {
        if self.rules == rules {
            return Outcome::Unchanged;
        }
        debug!(
            round_count = rules.round_count,
            ruleset = ?rules.ruleset,
            "rebuilding scoring engine"
        );
        self.rules = rules;
        self.history.clear();
        self.record.card.fit_rounds(rules.round_count);
        self.stamp();
        Outcome::Changed
    }

    /// Advisory: equal totals with no abandon and no bonus awarded.
    pub fn equality_warning(&self) -> bool {
        let card = &self.record.card;
        let total = self.record.totals.total;
        total.red == total.blue
            && !card.abandon.red
            && !card.abandon.blue
            && card.bonus == PerCorner::new(0, 0)
    }

    fn check_round(&self, round: u8) -> Result<()> {
        if (1..=self.rules.round_count).contains(&round) {
            Ok(())
        } else {
            self.reject(RuleViolation::RoundOutOfRange {
                round,
                round_count: self.rules.round_count,
            })
        }
    }

    fn reject<T>(&self, violation: RuleViolation) -> Result<T> {
        debug!(judge = %self.record.id, %violation, "entry rejected");
        Err(violation.into())
    }

    fn commit(&mut self, card: Scorecard) -> Outcome {
        let previous = std::mem::replace(&mut self.record.card, card);
        self.history.push(previous);
        self.stamp();
        Outcome::Changed
    }

    fn stamp(&mut self) {
        self.recompute();
        self.record.last_update_time = now_millis();
    }

    fn recompute(&mut self) {
        let record = &mut self.record;
        record.totals = Totals::compute(&record.card, self.rules.round_count, self.rules.ruleset);
        let decision = if record.card.is_blank() {
            Decision::Pending
        } else {
            Decision::derive(record.totals.total, record.card.abandon)
        };
        record.decision = decision.render(&self.fighters);
    }
}

fn toggle(rounds: &mut std::collections::BTreeSet<u8>, round: u8) {
    if !rounds.remove(&round) {
        rounds.insert(round);
    }
}

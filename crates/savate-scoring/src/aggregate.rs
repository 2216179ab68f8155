//! Delegate-side aggregation: round-by-round recap and majority decision.
//!
//! Only connected judges count. Recomputation is stateless: everything is
//! derived from the judge records handed in.

use savate_session::{Fighters, JudgeId};
use serde::{Deserialize, Serialize};

use crate::corner::{Corner, PerCorner};
use crate::decision::{result_name, Vote};
use crate::record::JudgeRecord;

/// Bout result across judges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalDecision {
    Red,
    Blue,
    Draw,
}

impl FinalDecision {
    pub fn label(&self, fighters: &Fighters) -> String {
        match self {
            Self::Red => format!("VICTOIRE {}", result_name(fighters, Corner::Red)),
            Self::Blue => format!("VICTOIRE {}", result_name(fighters, Corner::Blue)),
            Self::Draw => "ÉGALITÉ".to_string(),
        }
    }
}

/// Vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub red: usize,
    pub blue: usize,
    pub draw: usize,
    pub none: usize,
}

impl Tally {
    pub fn from_votes(votes: impl IntoIterator<Item = Vote>) -> Self {
        votes.into_iter().fold(Self::default(), |mut tally, vote| {
            match vote {
                Vote::Red => tally.red += 1,
                Vote::Blue => tally.blue += 1,
                Vote::Draw => tally.draw += 1,
                Vote::None => tally.none += 1,
            }
            tally
        })
    }

    /// Simple majority between red and blue wins. Equal counts draw.
    pub fn decision(&self) -> FinalDecision {
        match self.red.cmp(&self.blue) {
            std::cmp::Ordering::Greater => FinalDecision::Red,
            std::cmp::Ordering::Less => FinalDecision::Blue,
            std::cmp::Ordering::Equal => FinalDecision::Draw,
        }
    }

    pub fn majority(&self) -> usize {
        self.red.max(self.blue)
    }

    pub fn judges(&self) -> usize {
        self.red + self.blue + self.draw + self.none
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRound {
    pub judge: JudgeId,
    pub red: Option<u8>,
    pub blue: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecap {
    pub round: u8,
    pub judges: Vec<JudgeRound>,
    pub total: PerCorner<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeLine {
    pub judge: JudgeId,
    pub name: String,
    pub number: String,
    pub total: PerCorner<i32>,
    pub decision: String,
    pub vote: Vote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recap {
    pub rounds: Vec<RoundRecap>,
    pub judges: Vec<JudgeLine>,
    pub grand_total: PerCorner<i32>,
    pub tally: Tally,
    pub result: FinalDecision,
    pub result_label: String,
    pub majority: usize,
}

impl Recap {
    /// Build the recap over the connected judges, ordered by judge id.
    pub fn compute<'a>(
        records: impl IntoIterator<Item = &'a JudgeRecord>,
        round_count: u8,
        fighters: &Fighters,
    ) -> Self {
        let mut connected: Vec<&JudgeRecord> =
            records.into_iter().filter(|r| r.connected).collect();
        connected.sort_by_key(|r| r.id);

        let rounds = (1..=round_count)
            .map(|round| {
                let judges: Vec<JudgeRound> = connected
                    .iter()
                    .map(|record| {
                        let score = record.card.round(round).copied().unwrap_or_default();
                        JudgeRound {
                            judge: record.id,
                            red: score.red,
                            blue: score.blue,
                        }
                    })
                    .collect();
                let total = judges.iter().fold(PerCorner::default(), |acc: PerCorner<i32>, j| {
                    PerCorner::new(
                        acc.red + j.red.map(i32::from).unwrap_or(0),
                        acc.blue + j.blue.map(i32::from).unwrap_or(0),
                    )
                });
                RoundRecap { round, judges, total }
            })
            .collect();

        let judges: Vec<JudgeLine> = connected
            .iter()
            .map(|record| JudgeLine {
                judge: record.id,
                name: record.name.clone(),
                number: record.number.clone(),
                total: record.totals.total,
                decision: record.decision.clone(),
                vote: Vote::from_decision(&record.decision, fighters),
            })
            .collect();

        let grand_total = judges.iter().fold(PerCorner::default(), |acc: PerCorner<i32>, j| {
            PerCorner::new(acc.red + j.total.red, acc.blue + j.total.blue)
        });
        let tally = Tally::from_votes(judges.iter().map(|j| j.vote));
        let result = tally.decision();

        Self {
            rounds,
            judges,
            grand_total,
            tally,
            result,
            result_label: result.label(fighters),
            majority: tally.majority(),
        }
    }

    /// `Majorité: <max> sur <n> juges`
    pub fn majority_text(&self) -> String {
        format!("Majorité: {} sur {} juges", self.majority, self.judges.len())
    }
}

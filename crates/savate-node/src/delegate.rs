//! Delegate core: the judge map, fighter names, resets and the recap.
//!
//! Synchronous. Every method returns the messages to send; the node stamps
//! and delivers them.

use std::collections::{BTreeMap, HashMap};

use savate_protocols::{Envelope, FullSync, Handler, JudgeInfo, Message, Outbound, SessionConfig};
use savate_scoring::{DelegateAction, History, JudgeRecord, Recap, Scorecard, Totals};
use savate_session::{now_millis, Fighters, JudgeId, LocalIdentity, SessionContext, SessionStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::link::LinkId;

/// Per-judge line of the final-result report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVote {
    pub judge: JudgeId,
    pub name: String,
    pub decision: String,
}

/// Majority result across connected judges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResult {
    pub winner: String,
    pub majority: usize,
    pub judges: usize,
    pub summary: String,
    pub votes: Vec<JudgeVote>,
}

pub struct Delegate {
    ctx: SessionContext,
    fighters: Fighters,
    judges: BTreeMap<JudgeId, JudgeRecord>,
    links: HashMap<LinkId, Option<JudgeId>>,
    history: History<DelegateAction>,
}

impl Delegate {
    pub fn new(ctx: SessionContext) -> Self {
        info!(
            "Hosting session {} (code {}, {})",
            ctx.session.id,
            ctx.session.code,
            ctx.session.fight_type.label()
        );
        Self {
            ctx,
            fighters: Fighters::default(),
            judges: BTreeMap::new(),
            links: HashMap::new(),
            history: History::default(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn fighters(&self) -> &Fighters {
        &self.fighters
    }

    pub fn judges(&self) -> impl Iterator<Item = &JudgeRecord> {
        self.judges.values()
    }

    pub fn judge(&self, id: JudgeId) -> Option<&JudgeRecord> {
        self.judges.get(&id)
    }

    pub fn connected_judges(&self) -> usize {
        self.judges.values().filter(|r| r.connected).count()
    }

    pub fn expected_judges(&self) -> Option<u8> {
        match self.ctx.identity {
            LocalIdentity::Delegate { judge_count } => Some(judge_count),
            LocalIdentity::Judge(_) => None,
        }
    }

    pub fn link_opened(&mut self, link: LinkId) {
        self.links.insert(link, None);
    }

    /// The judge bound to `link` is kept but marked disconnected.
    pub fn link_lost(&mut self, link: LinkId) {
        let Some(Some(id)) = self.links.remove(&link) else {
            return;
        };
        if let Some(record) = self.judges.get_mut(&id) {
            if record.peer_link_id.as_deref() == Some(link.to_string().as_str()) {
                record.connected = false;
                record.last_update_time = now_millis();
                info!("Judge {} ({}) disconnected", record.name, id);
            }
        }
    }

    pub fn set_fighters(&mut self, fighters: Fighters) -> Vec<Outbound<LinkId>> {
        let fighters = Fighters::new(fighters.red.trim(), fighters.blue.trim());
        if fighters == self.fighters {
            return Vec::new();
        }
        self.history.push(DelegateAction::FighterNames {
            previous: self.fighters.clone(),
            new: fighters.clone(),
        });
        self.fighters = fighters;
        info!("Fighters: {} vs {}", self.fighters.red, self.fighters.blue);
        vec![Outbound::broadcast(Message::FighterNames(self.fighters.clone()))]
    }

    pub fn undo(&mut self) -> Result<(DelegateAction, Vec<Outbound<LinkId>>)> {
        let action = self
            .history
            .pop()
            .ok_or_else(|| Error::from(savate_scoring::Error::NothingToUndo))?;
        match &action {
            DelegateAction::FighterNames { previous, .. } => {
                self.fighters = previous.clone();
            }
        }
        info!("Undid {}", action.label());
        let out = vec![Outbound::broadcast(Message::FighterNames(self.fighters.clone()))];
        Ok((action, out))
    }

    /// New bout, same judges. Connected judges' records are cleared in place.
    pub fn reset_partial(&mut self) -> Result<Vec<Outbound<LinkId>>> {
        if self.links.is_empty() {
            return Err(Error::State("no judge is connected".into()));
        }
        self.fighters = Fighters::default();
        self.history.clear();
        for record in self.judges.values_mut().filter(|r| r.connected) {
            record.clear_scores();
            record.last_update_time = now_millis();
        }
        info!("Partial reset");
        Ok(vec![Outbound::broadcast(Message::ResetPartial {})])
    }

    /// Tell every judge the session is over. The caller tears links and
    /// identity down afterwards.
    pub fn reset_complete(&mut self) -> Vec<Outbound<LinkId>> {
        self.ctx.session.status = SessionStatus::Completed;
        info!("Complete reset of session {}", self.ctx.session.id);
        vec![Outbound::broadcast(Message::ResetComplete {})]
    }

    pub fn recap(&self) -> Recap {
        Recap::compute(self.judges.values(), self.ctx.session.round_count, &self.fighters)
    }

    pub fn final_result(&self) -> FinalResult {
        let recap = self.recap();
        FinalResult {
            winner: recap.result_label.clone(),
            majority: recap.majority,
            judges: recap.judges.len(),
            summary: recap.majority_text(),
            votes: recap
                .judges
                .iter()
                .map(|line| JudgeVote {
                    judge: line.judge,
                    name: line.name.clone(),
                    decision: line.decision.clone(),
                })
                .collect(),
        }
    }

    fn session_config(&self) -> Message {
        Message::SessionConfig(SessionConfig {
            fight_type: self.ctx.session.fight_type,
            round_count: self.ctx.session.round_count,
            fighters: self.fighters.clone(),
        })
    }

    fn on_judge_info(&mut self, link: LinkId, info: JudgeInfo) -> Vec<Outbound<LinkId>> {
        let round_count = self.ctx.session.round_count;
        let record = self.judges.entry(info.id).or_insert_with(|| JudgeRecord {
            id: info.id,
            name: info.name.clone(),
            number: info.number.clone(),
            peer_link_id: None,
            connected: true,
            last_update_time: 0,
            card: Scorecard::blank(round_count),
            totals: Totals::default(),
            decision: savate_scoring::Decision::Pending.to_string(),
        });
        let returning = record.peer_link_id.is_some();
        record.name = info.name;
        record.number = info.number;
        record.peer_link_id = Some(link.to_string());
        record.connected = true;
        record.last_update_time = info.last_update_time.max(now_millis());
        info!(
            "Judge {} ({}) {} on {}",
            record.name,
            record.id,
            if returning { "reconnected" } else { "joined" },
            link
        );

        self.links.insert(link, Some(info.id));
        if self.ctx.session.status == SessionStatus::Waiting {
            self.ctx.session.status = SessionStatus::Active;
        }
        vec![Outbound::to(link, self.session_config())]
    }

    fn on_judge_data(&mut self, link: LinkId, data: JudgeRecord) -> Vec<Outbound<LinkId>> {
        let Some(Some(id)) = self.links.get(&link).copied() else {
            warn!("judge_data on {} before judge_info, dropped", link);
            return Vec::new();
        };
        if data.id != id {
            warn!("judge_data for judge {} arrived on {} bound to judge {}", data.id, link, id);
        }
        if let Some(record) = self.judges.get_mut(&id) {
            record.name = data.name;
            record.number = data.number;
            record.card = data.card;
            record.totals = data.totals;
            record.decision = data.decision;
            record.last_update_time = now_millis();
            record.connected = true;
            debug!("Judge {} now at {}", id, record.decision);
        }
        Vec::new()
    }
}

impl Handler<LinkId> for Delegate {
    fn handle(&mut self, from: &LinkId, envelope: Envelope) -> Vec<Outbound<LinkId>> {
        let link = *from;
        match envelope.message {
            Message::JudgeInfo(info) => self.on_judge_info(link, info),
            Message::JudgeData(data) => self.on_judge_data(link, data),
            Message::SyncRequest {} => {
                debug!("Full sync requested on {}", link);
                vec![Outbound::to(
                    link,
                    Message::FullSync(FullSync {
                        session: self.ctx.session.clone(),
                        fighters: self.fighters.clone(),
                        judges: self.judges.values().cloned().collect(),
                    }),
                )]
            }
            message @ (Message::FighterNames(_)
            | Message::SessionConfig(_)
            | Message::FullSync(_)
            | Message::ResetPartial {}
            | Message::ResetComplete {}) => {
                warn!("Delegate ignores {} from {}", message.kind(), link);
                Vec::new()
            }
        }
    }
}

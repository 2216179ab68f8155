//! Judge core: the local scoring engine and its single link to the delegate.

use savate_protocols::{Envelope, Handler, JudgeInfo, Message, Outbound};
use savate_scoring::{Corner, JudgeRecord, Outcome, Rules, ScoringEngine};
use savate_session::{FightType, Fighters, JudgeProfile, SessionContext};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::link::LinkId;

pub struct Judge {
    ctx: SessionContext,
    profile: JudgeProfile,
    engine: ScoringEngine,
    delegate_link: Option<LinkId>,
    configured: bool,
    ended: bool,
}

impl Judge {
    pub fn new(ctx: SessionContext) -> Result<Self> {
        let profile = ctx
            .judge_profile()
            .cloned()
            .ok_or_else(|| Error::State("session was not joined as a judge".into()))?;
        let rules = Rules::new(ctx.session.round_count, ctx.session.ruleset());
        let engine = ScoringEngine::new(&profile, rules);
        Ok(Self {
            ctx,
            profile,
            engine,
            delegate_link: None,
            configured: false,
            ended: false,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn record(&self) -> &JudgeRecord {
        self.engine.record()
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn is_connected(&self) -> bool {
        self.delegate_link.is_some()
    }

    /// True once `session_config` or `full_sync` has arrived on this link.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// The delegate ended the session.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Introduce ourselves, then send the current scorecard so the delegate
    /// replaces whatever it kept from an earlier link, blank or not.
    pub fn link_opened(&mut self, link: LinkId) -> Vec<Outbound<LinkId>> {
        info!("Linked to delegate on {}", link);
        self.delegate_link = Some(link);
        self.configured = false;
        let info = Message::JudgeInfo(JudgeInfo {
            id: self.profile.id,
            name: self.profile.name.clone(),
            number: self.profile.number.clone(),
            connected: true,
            last_update_time: self.engine.record().last_update_time,
        });
        vec![Outbound::broadcast(info), self.snapshot()]
    }

    pub fn link_lost(&mut self, link: LinkId) {
        if self.delegate_link == Some(link) {
            warn!("Lost delegate link {}; searching for delegate", link);
            self.delegate_link = None;
            self.configured = false;
        }
    }

    pub fn set_score(&mut self, round: u8, corner: Corner, value: Option<u8>) -> Result<Vec<Outbound<LinkId>>> {
        let outcome = self.engine.set_score(round, corner, value)?;
        Ok(self.propagate(outcome))
    }

    pub fn toggle_warning(&mut self, corner: Corner, round: u8) -> Result<Vec<Outbound<LinkId>>> {
        let outcome = self.engine.toggle_warning(corner, round)?;
        Ok(self.propagate(outcome))
    }

    pub fn toggle_count(&mut self, corner: Corner, round: u8) -> Result<Vec<Outbound<LinkId>>> {
        let outcome = self.engine.toggle_count(corner, round)?;
        Ok(self.propagate(outcome))
    }

    pub fn toggle_abandon(&mut self, corner: Corner) -> Vec<Outbound<LinkId>> {
        let outcome = self.engine.toggle_abandon(corner);
        self.propagate(outcome)
    }

    pub fn set_bonus(&mut self, corner: Corner, value: u8) -> Result<Vec<Outbound<LinkId>>> {
        let outcome = self.engine.set_bonus(corner, value)?;
        Ok(self.propagate(outcome))
    }

    pub fn undo(&mut self) -> Result<Vec<Outbound<LinkId>>> {
        self.engine.undo()?;
        Ok(self.propagate(Outcome::Changed))
    }

    pub fn request_sync(&self) -> Result<Vec<Outbound<LinkId>>> {
        if !self.is_connected() {
            return Err(Error::State("not connected to the delegate".into()));
        }
        Ok(vec![Outbound::broadcast(Message::SyncRequest {})])
    }

    fn snapshot(&self) -> Outbound<LinkId> {
        Outbound::broadcast(Message::JudgeData(self.engine.record().clone()))
    }

    fn propagate(&self, outcome: Outcome) -> Vec<Outbound<LinkId>> {
        if outcome.is_changed() && self.is_connected() {
            vec![self.snapshot()]
        } else {
            Vec::new()
        }
    }

    /// Take the delegate's fight type and names. The round count always
    /// follows the fight type; the engine is only rebuilt if its rules differ.
    fn configure(&mut self, fight_type: FightType, round_count: u8, fighters: Fighters) -> Outcome {
        self.configured = true;
        let expected = fight_type.round_count();
        if round_count != expected {
            warn!(
                "Ignoring round count {} for {}; scoring {} rounds",
                round_count,
                fight_type.label(),
                expected
            );
        }
        self.ctx.adopt_fight_type(fight_type, expected);
        let mut changed = self.engine.set_rules(Rules::new(expected, fight_type.ruleset()));
        if changed.is_changed() {
            info!("Scoring {} over {} rounds", fight_type.label(), expected);
        }
        if self.engine.set_fighters(fighters).is_changed() {
            changed = Outcome::Changed;
        }
        changed
    }
}

impl Handler<LinkId> for Judge {
    fn handle(&mut self, from: &LinkId, envelope: Envelope) -> Vec<Outbound<LinkId>> {
        let Envelope {
            message, session_id, ..
        } = envelope;
        match message {
            Message::SessionConfig(config) => {
                if self.ctx.session.id != session_id {
                    debug!("Joined session {}", session_id);
                    self.ctx.session.id = session_id;
                }
                let outcome = self.configure(config.fight_type, config.round_count, config.fighters);
                self.propagate(outcome)
            }
            Message::FullSync(sync) => {
                self.ctx.adopt_session(&sync.session);
                let outcome = self.configure(sync.session.fight_type, sync.session.round_count, sync.fighters);
                debug!("Full sync: {} judges known to the delegate", sync.judges.len());
                self.propagate(outcome)
            }
            Message::FighterNames(fighters) => {
                let outcome = self.engine.set_fighters(fighters);
                self.propagate(outcome)
            }
            Message::ResetPartial {} => {
                info!("Partial reset by the delegate");
                self.engine.reset();
                self.engine.set_fighters(Fighters::default());
                Vec::new()
            }
            Message::ResetComplete {} => {
                info!("Session ended by the delegate");
                self.ended = true;
                Vec::new()
            }
            message @ (Message::JudgeInfo(_) | Message::JudgeData(_) | Message::SyncRequest {}) => {
                warn!("Judge ignores {} from {}", message.kind(), from);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savate_protocols::{FullSync, SessionConfig};
    use savate_session::{create_session, join_session, Session, SessionId};

    fn judge() -> Judge {
        Judge::new(join_session("4821", "Martin", "2").unwrap()).unwrap()
    }

    fn deliver(judge: &mut Judge, message: Message) -> Vec<Outbound<LinkId>> {
        let env = Envelope::stamp(message, &judge.context().session.id);
        judge.handle(&LinkId(1), env)
    }

    fn config(fight_type: FightType, fighters: Fighters) -> Message {
        Message::SessionConfig(SessionConfig {
            fight_type,
            round_count: fight_type.round_count(),
            fighters,
        })
    }

    #[test]
    fn delegate_context_is_rejected() {
        assert!(Judge::new(create_session(FightType::Assaut, 3).unwrap()).is_err());
    }

    #[test]
    fn opening_the_link_sends_judge_info() {
        let mut judge = judge();
        let out = judge.link_opened(LinkId(1));
        assert_eq!(out.len(), 2);
        match &out[0].message {
            Message::JudgeInfo(info) => {
                assert_eq!(info.name, "Martin");
                assert_eq!(info.number, "2");
                assert!(info.connected);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &out[1].message {
            Message::JudgeData(record) => assert!(record.card.is_blank()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(judge.is_connected());
        assert!(!judge.is_configured());
    }

    #[test]
    fn scoring_propagates_only_while_linked() {
        let mut judge = judge();
        assert!(judge.set_score(1, Corner::Red, Some(3)).unwrap().is_empty());

        let out = judge.link_opened(LinkId(1));
        assert_eq!(out.len(), 2, "judge_info then the existing scorecard");

        let out = judge.set_score(1, Corner::Blue, Some(2)).unwrap();
        assert!(matches!(&out[..], [Outbound { message: Message::JudgeData(r), .. }] if r.totals.total.blue == 2));
        assert!(judge.set_score(1, Corner::Blue, Some(2)).unwrap().is_empty());
        assert!(judge.set_score(2, Corner::Red, Some(3)).is_ok());
        assert!(matches!(judge.set_score(2, Corner::Blue, Some(3)), Err(Error::Validation(_))));
    }

    #[test]
    fn session_config_rebuilds_for_five_rounds() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        judge.set_score(1, Corner::Red, Some(3)).unwrap();

        let out = deliver(&mut judge, config(FightType::Combat1Seniors, Fighters::new("Dupont", "Martin")));
        assert!(judge.is_configured());
        assert_eq!(judge.context().session.round_count, 5);
        assert_eq!(judge.record().card.scores.len(), 5);
        assert_eq!(judge.record().decision, "VICTOIRE Dupont (3-0)");
        assert_eq!(out.len(), 1);
        assert!(judge.toggle_count(Corner::Blue, 4).unwrap().len() == 1);
    }

    #[test]
    fn session_config_carries_the_delegate_session_id() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        let hosted = SessionId::generate();
        let env = Envelope::stamp(config(FightType::Assaut, Fighters::default()), &hosted);
        judge.handle(&LinkId(1), env);
        assert_eq!(judge.context().session.id, hosted);
    }

    #[test]
    fn same_config_twice_is_quiet() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        assert!(deliver(&mut judge, config(FightType::Assaut, Fighters::default())).is_empty());
        assert!(judge.is_configured());
    }

    #[test]
    fn full_sync_adopts_delegate_session() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        let host = create_session(FightType::Combat2Espoirs, 3).unwrap();
        let session = Session {
            code: judge.context().session.code.clone(),
            ..host.session
        };
        deliver(
            &mut judge,
            Message::FullSync(FullSync {
                session: session.clone(),
                fighters: Fighters::new("A", "B"),
                judges: Vec::new(),
            }),
        );
        assert_eq!(judge.context().session.id, session.id);
        assert!(judge.context().session.fight_type.is_combat());
        assert_eq!(judge.engine().rules().ruleset, FightType::Combat2Espoirs.ruleset());
        assert_eq!(judge.engine().fighters(), &Fighters::new("A", "B"));
        assert_eq!(judge.toggle_count(Corner::Red, 1).unwrap().len(), 1);
    }

    #[test]
    fn undo_while_linked_sends_the_restored_card() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        judge.set_score(1, Corner::Red, Some(3)).unwrap();
        let before = judge.record().card.clone();
        judge.set_score(1, Corner::Blue, Some(2)).unwrap();

        let out = judge.undo().unwrap();
        match &out[..] {
            [Outbound { message: Message::JudgeData(record), .. }] => {
                assert_eq!(record.card, before);
                assert_eq!(record.totals.total.blue, 0);
                assert_eq!(record.decision, "VICTOIRE ROUGE (3-0)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn round_count_follows_the_fight_type() {
        for fight_type in [FightType::Assaut, FightType::Combat1Seniors] {
            let mut judge = judge();
            judge.link_opened(LinkId(1));
            deliver(
                &mut judge,
                Message::SessionConfig(SessionConfig {
                    fight_type,
                    round_count: 0,
                    fighters: Fighters::default(),
                }),
            );
            let expected = fight_type.round_count();
            assert_eq!(judge.context().session.round_count, expected);
            assert_eq!(judge.record().card.scores.len(), usize::from(expected));
            assert_eq!(judge.set_score(expected, Corner::Red, Some(3)).unwrap().len(), 1);
        }
    }

    #[test]
    fn partial_reset_clears_the_card_but_keeps_the_link() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        deliver(&mut judge, config(FightType::Combat2Seniors, Fighters::new("A", "B")));
        judge.set_score(1, Corner::Red, Some(3)).unwrap();
        judge.toggle_warning(Corner::Blue, 1).unwrap();
        judge.toggle_count(Corner::Blue, 2).unwrap();
        judge.toggle_abandon(Corner::Red);

        assert!(deliver(&mut judge, Message::ResetPartial {}).is_empty());
        let record = judge.record();
        assert!(record.card.is_blank());
        assert_eq!(record.decision, "-");
        assert!(judge.is_connected());
        assert!(matches!(judge.undo(), Err(Error::State(_))));
    }

    #[test]
    fn complete_reset_ends_the_session() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        deliver(&mut judge, Message::ResetComplete {});
        assert!(judge.has_ended());
    }

    #[test]
    fn losing_the_link_blocks_sync_requests() {
        let mut judge = judge();
        judge.link_opened(LinkId(1));
        assert_eq!(judge.request_sync().unwrap().len(), 1);
        judge.link_lost(LinkId(1));
        assert!(!judge.is_connected());
        assert!(matches!(judge.request_sync(), Err(Error::State(_))));
    }
}

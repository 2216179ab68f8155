//! Node runtime: one event loop owning a delegate or judge core.
//!
//! Link events and local commands are handled strictly one at a time, so the
//! core never sees concurrent mutation. Cores return the messages they want
//! sent; the loop stamps and delivers them.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use savate_protocols::{DispatchStats, Dispatcher, Envelope, Handler, Outbound, Target};
use savate_session::{Fighters, FightType, PeerAddress, Role, SessionContext, SessionStatus};

use crate::config::NodeConfig;
use crate::connection::ConnectionManager;
use crate::control::{ControlCommand, ControlResponse};
use crate::delegate::Delegate;
use crate::error::{Error, Result};
use crate::judge::Judge;
use crate::link::{LinkEvent, LinkId};

/// Why [`ScoringNode::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The delegate ran a complete reset; build a fresh node.
    Reset,
    /// The delegate ended the session this judge was part of.
    SessionEnded,
    /// Every handle was dropped.
    Stopped,
}

/// Connectivity shown next to the session code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Initialising,
    WaitingForJudges,
    SearchingForDelegate,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub role: Role,
    pub peer: String,
    pub code: String,
    pub session_id: String,
    pub session_status: SessionStatus,
    pub fight_type: FightType,
    pub round_count: u8,
    pub fighters: Fighters,
    pub connectivity: Connectivity,
    pub links: usize,
    pub judges_connected: Option<usize>,
    pub judges_expected: Option<u8>,
    pub last_sync: Option<u64>,
    pub received: u64,
    pub dropped: u64,
}

/// The role-specific half of a node.
pub enum Core {
    Delegate(Delegate),
    Judge(Judge),
}

impl Core {
    pub fn new(ctx: SessionContext) -> Result<Self> {
        Ok(match ctx.role() {
            Role::Delegate => Self::Delegate(Delegate::new(ctx)),
            Role::Judge => Self::Judge(Judge::new(ctx)?),
        })
    }

    pub fn context(&self) -> &SessionContext {
        match self {
            Self::Delegate(d) => d.context(),
            Self::Judge(j) => j.context(),
        }
    }

    fn fighters(&self) -> &Fighters {
        match self {
            Self::Delegate(d) => d.fighters(),
            Self::Judge(j) => j.engine().fighters(),
        }
    }
}

impl Handler<LinkId> for Core {
    fn handle(&mut self, from: &LinkId, envelope: Envelope) -> Vec<Outbound<LinkId>> {
        match self {
            Self::Delegate(d) => d.handle(from, envelope),
            Self::Judge(j) => j.handle(from, envelope),
        }
    }
}

struct Request {
    command: ControlCommand,
    reply: oneshot::Sender<ControlResponse>,
}

/// Cloneable way in to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    tx: mpsc::Sender<Request>,
}

impl NodeHandle {
    /// Queue a command and wait for the loop to answer it.
    pub async fn request(&self, command: ControlCommand) -> Result<ControlResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| Error::State("node is not running".into()))?;
        rx.await
            .map_err(|_| Error::State("node stopped before answering".into()))
    }
}

pub struct ScoringNode {
    core: Core,
    connections: ConnectionManager,
    dispatcher: Dispatcher,
    commands: mpsc::Receiver<Request>,
    finished: Option<RunOutcome>,
}

impl ScoringNode {
    /// Build the session from `config`, register with the rendezvous and,
    /// for a judge, dial the delegate.
    pub async fn start(config: &NodeConfig) -> Result<(Self, NodeHandle)> {
        let core = Core::new(config.session_context()?)?;
        let mut connections =
            ConnectionManager::new(core.context().local_address(), config.rendezvous.clone());
        connections
            .open(config.listen_addr, |bound| config.advertised(bound))
            .await?;

        let (tx, commands) = mpsc::channel(32);
        let mut node = Self {
            core,
            connections,
            dispatcher: Dispatcher::new(),
            commands,
            finished: None,
        };
        if matches!(node.core, Core::Judge(_)) {
            if let Err(e) = node.dial_delegate().await {
                warn!("Delegate not reachable yet: {}", e);
            }
        }
        Ok((node, NodeHandle { tx }))
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn local(&self) -> &PeerAddress {
        self.connections.local()
    }

    /// Serve link events and commands until the session is over for us.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        loop {
            if let Some(outcome) = self.finished.take() {
                self.connections.shutdown();
                info!("Node loop finished: {:?}", outcome);
                return Ok(outcome);
            }
            tokio::select! {
                event = self.connections.next_event() => match event {
                    Some(event) => self.on_link_event(event),
                    None => self.finished = Some(RunOutcome::Stopped),
                },
                request = self.commands.recv() => match request {
                    Some(Request { command, reply }) => {
                        let response = self.execute(command).await;
                        let _ = reply.send(response);
                    }
                    None => self.finished = Some(RunOutcome::Stopped),
                },
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened { link, peer } => {
                let outbound = match &mut self.core {
                    Core::Delegate(d) => {
                        d.link_opened(link);
                        Vec::new()
                    }
                    Core::Judge(j) if peer == j.context().delegate_address() => j.link_opened(link),
                    Core::Judge(_) => {
                        warn!("Judge refusing link from {}", peer);
                        self.connections.close(link);
                        Vec::new()
                    }
                };
                self.deliver(outbound);
            }
            LinkEvent::Data { link, line } => {
                let outbound = self.dispatcher.dispatch(&mut self.core, &link, &line);
                self.deliver(outbound);
                if let Core::Judge(j) = &self.core {
                    if j.has_ended() {
                        self.finished = Some(RunOutcome::SessionEnded);
                    }
                }
            }
            LinkEvent::Closed { link } | LinkEvent::Errored { link, .. } => match &mut self.core {
                Core::Delegate(d) => d.link_lost(link),
                Core::Judge(j) => j.link_lost(link),
            },
        }
    }

    /// Stamp and send. Unicast goes to one link, broadcast to all open ones.
    fn deliver(&mut self, outbound: Vec<Outbound<LinkId>>) {
        let session_id = self.core.context().session.id.clone();
        for Outbound { target, message } in outbound {
            let kind = message.kind();
            let line = match Envelope::stamp(message, &session_id).encode() {
                Ok(line) => line,
                Err(e) => {
                    error!("Cannot encode {}: {}", kind, e);
                    continue;
                }
            };
            match target {
                Target::Unicast(link) => {
                    if let Err(e) = self.connections.send(link, &line) {
                        warn!("{} to {} not sent: {}", kind, link, e);
                    }
                }
                Target::Broadcast => {
                    let sent = self.connections.broadcast(&line);
                    debug!("{} broadcast to {} links", kind, sent);
                }
            }
        }
    }

    async fn dial_delegate(&mut self) -> Result<()> {
        let delegate = self.core.context().delegate_address();
        self.connections.connect(&delegate).await?;
        Ok(())
    }

    pub fn status(&self) -> NodeStatus {
        let ctx = self.core.context();
        let links = self.connections.link_count();
        let (connectivity, judges_connected, judges_expected) = match &self.core {
            _ if !self.connections.is_registered() => (Connectivity::Initialising, None, None),
            Core::Delegate(d) => {
                let connected = d.connected_judges();
                let connectivity = if connected > 0 {
                    Connectivity::Connected
                } else {
                    Connectivity::WaitingForJudges
                };
                (connectivity, Some(connected), d.expected_judges())
            }
            Core::Judge(j) if j.is_connected() => (Connectivity::Connected, None, None),
            Core::Judge(_) => (Connectivity::SearchingForDelegate, None, None),
        };
        let stats: DispatchStats = self.dispatcher.stats();
        NodeStatus {
            role: ctx.role(),
            peer: ctx.local_address().to_string(),
            code: ctx.session.code.to_string(),
            session_id: ctx.session.id.to_string(),
            session_status: ctx.session.status,
            fight_type: ctx.session.fight_type,
            round_count: ctx.session.round_count,
            fighters: self.core.fighters().clone(),
            connectivity,
            links,
            judges_connected,
            judges_expected,
            last_sync: self.dispatcher.last_sync(),
            received: stats.received,
            dropped: stats.unknown + stats.malformed,
        }
    }

    async fn execute(&mut self, command: ControlCommand) -> ControlResponse {
        match self.apply(command).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Command rejected: {}", e);
                ControlResponse::Error {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn apply(&mut self, command: ControlCommand) -> Result<ControlResponse> {
        use ControlCommand as C;

        match command {
            C::Ping => return Ok(ControlResponse::Pong),
            C::Status => {
                return Ok(ControlResponse::Status {
                    node: self.status(),
                })
            }
            _ => {}
        }

        match &mut self.core {
            Core::Delegate(d) => {
                let (outbound, response) = match command {
                    C::SetFighters { red, blue } => {
                        let outbound = d.set_fighters(Fighters::new(red, blue));
                        let message = if outbound.is_empty() {
                            "Noms inchangés".to_string()
                        } else {
                            format!("Noms: {} / {}", d.fighters().red, d.fighters().blue)
                        };
                        (outbound, ControlResponse::Ok { message })
                    }
                    C::Undo => {
                        let (action, outbound) = d.undo()?;
                        let message = format!("Annulé: {}", action.label());
                        (outbound, ControlResponse::Ok { message })
                    }
                    C::ResetPartial => {
                        let outbound = d.reset_partial()?;
                        let message = "Réinitialisation partielle".to_string();
                        (outbound, ControlResponse::Ok { message })
                    }
                    C::ResetComplete => {
                        let outbound = d.reset_complete();
                        self.finished = Some(RunOutcome::Reset);
                        let message = "Réinitialisation complète".to_string();
                        (outbound, ControlResponse::Ok { message })
                    }
                    C::Recap => (
                        Vec::new(),
                        ControlResponse::Recap {
                            recap: d.recap(),
                            result: d.final_result(),
                        },
                    ),
                    other => {
                        return Err(Error::State(format!("{} is a judge command", other.name())))
                    }
                };
                self.deliver(outbound);
                Ok(response)
            }
            Core::Judge(j) => {
                let outbound = match command {
                    C::SetScore { round, corner, value } => j.set_score(round, corner, value)?,
                    C::ToggleWarning { corner, round } => j.toggle_warning(corner, round)?,
                    C::ToggleCount { corner, round } => j.toggle_count(corner, round)?,
                    C::ToggleAbandon { corner } => j.toggle_abandon(corner),
                    C::SetBonus { corner, value } => j.set_bonus(corner, value)?,
                    C::Undo => j.undo()?,
                    C::Sync if j.is_connected() => j.request_sync()?,
                    C::Sync => {
                        info!("Searching for delegate");
                        self.dial_delegate().await?;
                        return Ok(ControlResponse::Ok {
                            message: "Reconnexion au délégué".into(),
                        });
                    }
                    other => {
                        return Err(Error::State(format!(
                            "{} is a delegate command",
                            other.name()
                        )))
                    }
                };
                self.deliver(outbound);
                Ok(self.record_response())
            }
        }
    }

    fn record_response(&self) -> ControlResponse {
        match &self.core {
            Core::Judge(j) => ControlResponse::Record {
                record: j.record().clone(),
                equality_warning: j.engine().equality_warning(),
            },
            Core::Delegate(_) => ControlResponse::Ok {
                message: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JudgeAccess;
    use crate::rendezvous::RendezvousServer;
    use savate_scoring::Corner;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    async fn rendezvous() -> String {
        let server = RendezvousServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr.to_string()
    }

    fn config(rendezvous: &str, role: Role, judge: JudgeAccess) -> NodeConfig {
        NodeConfig {
            role,
            rendezvous: rendezvous.to_string(),
            listen_addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            advertise_addr: None,
            fight_type: FightType::Assaut,
            judge_count: 3,
            judge,
            control_socket: PathBuf::from("unused.sock"),
        }
    }

    #[tokio::test]
    async fn delegate_starts_waiting_for_judges() {
        let rendezvous = rendezvous().await;
        let (node, _handle) = ScoringNode::start(&config(&rendezvous, Role::Delegate, JudgeAccess::default()))
            .await
            .unwrap();
        let status = node.status();
        assert_eq!(status.connectivity, Connectivity::WaitingForJudges);
        assert_eq!(status.judges_connected, Some(0));
        assert_eq!(status.judges_expected, Some(3));
        assert_eq!(status.session_status, SessionStatus::Waiting);
        assert_eq!(status.peer, format!("delegate_{}", status.code));
    }

    #[tokio::test]
    async fn judge_without_delegate_keeps_searching() {
        let rendezvous = rendezvous().await;
        let access = JudgeAccess {
            code: "4821".into(),
            name: "Martin".into(),
            number: "1".into(),
        };
        let (mut node, handle) = ScoringNode::start(&config(&rendezvous, Role::Judge, access))
            .await
            .unwrap();
        assert_eq!(node.status().connectivity, Connectivity::SearchingForDelegate);

        let driver = tokio::spawn(async move { node.run().await });
        let response = handle
            .request(ControlCommand::SetScore {
                round: 1,
                corner: Corner::Red,
                value: Some(3),
            })
            .await
            .unwrap();
        match response {
            ControlResponse::Record { record, .. } => assert_eq!(record.totals.total.red, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            handle.request(ControlCommand::Sync).await.unwrap(),
            ControlResponse::Error { .. }
        ));
        assert!(matches!(
            handle.request(ControlCommand::Recap).await.unwrap(),
            ControlResponse::Error { .. }
        ));

        drop(handle);
        assert_eq!(driver.await.unwrap().unwrap(), RunOutcome::Stopped);
    }

    #[tokio::test]
    async fn start_fails_without_rendezvous() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let result = ScoringNode::start(&config(&addr, Role::Delegate, JudgeAccess::default())).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}

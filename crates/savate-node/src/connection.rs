//! Connection manager: the local peer identity and the active-link set.
//!
//! Hub and spoke. The delegate only accepts, a judge only dials the
//! delegate. Links that close or error are removed from the active set
//! before their event is handed to the node, so the node never sends on a
//! dead link twice.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use savate_session::PeerAddress;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::link::{send_hello, Established, Link, LinkEvent, LinkId, LinkState};
use crate::rendezvous::{self, Registration};

pub struct ConnectionManager {
    local: PeerAddress,
    rendezvous: String,
    registration: Option<Registration>,
    listen_addr: Option<SocketAddr>,
    acceptor: Option<JoinHandle<()>>,
    links: BTreeMap<LinkId, Link>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    incoming_tx: mpsc::UnboundedSender<Established>,
    incoming_rx: mpsc::UnboundedReceiver<Established>,
}

impl ConnectionManager {
    pub fn new(local: PeerAddress, rendezvous: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            local,
            rendezvous: rendezvous.into(),
            registration: None,
            listen_addr: None,
            acceptor: None,
            links: BTreeMap::new(),
            next_id: 1,
            events_tx,
            events_rx,
            incoming_tx,
            incoming_rx,
        }
    }

    pub fn local(&self) -> &PeerAddress {
        &self.local
    }

    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Bind the link listener and register the local identity.
    ///
    /// `advertise` maps the bound address to the one published on the
    /// rendezvous. Nothing is left running if registration fails.
    pub async fn open(
        &mut self,
        listen: SocketAddr,
        advertise: impl FnOnce(SocketAddr) -> SocketAddr,
    ) -> Result<SocketAddr> {
        let listener = TcpListener::bind(listen).await?;
        let bound = listener.local_addr()?;
        let published = advertise(bound);

        let registration =
            rendezvous::register(self.rendezvous.as_str(), &self.local.to_string(), published).await?;
        info!("Registered {} at {} (listening on {})", self.local, published, bound);

        let incoming = self.incoming_tx.clone();
        self.acceptor = Some(tokio::spawn(accept_loop(listener, incoming)));
        self.registration = Some(registration);
        self.listen_addr = Some(bound);
        Ok(bound)
    }

    /// Dial a registered peer. The link is reported as `Opened` through
    /// [`next_event`](Self::next_event) like an accepted one.
    pub async fn connect(&mut self, remote: &PeerAddress) -> Result<LinkId> {
        debug!("{} -> {}: {:?}", self.local, remote, LinkState::Connecting);
        let addr = rendezvous::resolve(self.rendezvous.as_str(), &remote.to_string())
            .await?
            .ok_or_else(|| Error::Transport(format!("{remote} is not registered")))?;

        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Transport(format!("cannot reach {remote} at {addr}: {e}")))?;
        send_hello(&mut stream, &self.local).await?;

        Ok(self.accept(Established::dialled(stream, remote.clone())))
    }

    /// Add an established stream to the active set.
    pub fn accept(&mut self, stream: Established) -> LinkId {
        let id = LinkId(self.next_id);
        self.next_id += 1;

        let peer = stream.peer.clone();
        info!("{} open with {}", id, peer);
        self.links.insert(id, Link::spawn(id, stream, self.events_tx.clone()));
        let _ = self.events_tx.send(LinkEvent::Opened { link: id, peer });
        id
    }

    /// Next event on a live link. Accepted streams are registered on the way.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        loop {
            tokio::select! {
                Some(stream) = self.incoming_rx.recv() => {
                    self.accept(stream);
                }
                Some(event) = self.events_rx.recv() => {
                    if let Some(event) = self.admit(event) {
                        return Some(event);
                    }
                }
                else => return None,
            }
        }
    }

    /// Drop events for links no longer in the active set; remove links whose
    /// event is terminal.
    fn admit(&mut self, event: LinkEvent) -> Option<LinkEvent> {
        let id = event.link();
        let terminal = match event {
            LinkEvent::Closed { .. } => Some(LinkState::Closed),
            LinkEvent::Errored { .. } => Some(LinkState::Errored),
            LinkEvent::Opened { .. } | LinkEvent::Data { .. } => None,
        };
        match terminal {
            Some(state) => {
                let mut link = self.links.remove(&id)?;
                link.mark(state);
                info!("{} to {} removed ({:?})", id, link.peer(), link.state());
                Some(event)
            }
            None => self.links.contains_key(&id).then_some(event),
        }
    }

    /// Queue a line on one link. A link that fails is reported as errored.
    pub fn send(&mut self, link: LinkId, line: &str) -> Result<()> {
        let Some(target) = self.links.get_mut(&link) else {
            return Err(Error::Transport(format!("{link} is not open")));
        };
        if let Err(e) = target.send(line.to_string()) {
            warn!("Dropping message for {}: {}", link, e);
            target.mark(LinkState::Errored);
            let _ = self.events_tx.send(LinkEvent::Errored {
                link,
                error: e.to_string(),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Queue a line on every open link. Returns how many accepted it.
    pub fn broadcast(&mut self, line: &str) -> usize {
        let ids: Vec<LinkId> = self.open_links().map(|(id, _)| id).collect();
        ids.into_iter().filter(|id| self.send(*id, line).is_ok()).count()
    }

    pub fn open_links(&self) -> impl Iterator<Item = (LinkId, &PeerAddress)> + '_ {
        self.links
            .values()
            .filter(|link| link.state() == LinkState::Open)
            .map(|link| (link.id(), link.peer()))
    }

    pub fn link_count(&self) -> usize {
        self.open_links().count()
    }

    pub fn state(&self, link: LinkId) -> Option<LinkState> {
        self.links.get(&link).map(Link::state)
    }

    /// Close one link locally. No event is reported for it.
    pub fn close(&mut self, link: LinkId) {
        if let Some(mut link) = self.links.remove(&link) {
            link.close();
        }
    }

    pub fn close_all(&mut self) {
        for (_, mut link) in std::mem::take(&mut self.links) {
            link.close();
        }
    }

    /// Close every link and drop the local identity.
    pub fn shutdown(&mut self) {
        self.close_all();
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        if let Some(registration) = self.registration.take() {
            info!("Dropping identity {}", registration.peer_id());
        }
        self.listen_addr = None;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, incoming: mpsc::UnboundedSender<Established>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let incoming = incoming.clone();
                tokio::spawn(async move {
                    match Established::accept(stream).await {
                        Ok(established) => {
                            debug!("Hello from {} ({})", established.peer, addr);
                            let _ = incoming.send(established);
                        }
                        Err(e) => warn!("Rejected link from {}: {}", addr, e),
                    }
                });
            }
            Err(e) => {
                warn!("Failed to accept link: {}", e);
            }
        }
    }
}

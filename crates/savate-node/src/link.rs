//! Peer links: one TCP stream per delegate/judge pair.
//!
//! The initiator opens with a `hello` line naming its own address, after
//! which both directions carry newline-delimited envelopes. Each link runs a
//! reader task that reports [`LinkEvent`]s and a writer task fed by a
//! channel.

use std::fmt;
use std::time::Duration;

use savate_session::PeerAddress;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How long an acceptor waits for the initiator's hello.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// `Connecting → Open → {Closed | Errored}`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened { link: LinkId, peer: PeerAddress },
    Data { link: LinkId, line: String },
    Closed { link: LinkId },
    Errored { link: LinkId, error: String },
}

impl LinkEvent {
    pub fn link(&self) -> LinkId {
        match self {
            Self::Opened { link, .. }
            | Self::Data { link, .. }
            | Self::Closed { link }
            | Self::Errored { link, .. } => *link,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Handshake {
    Hello { peer: PeerAddress },
}

/// Send our hello on a freshly dialled stream.
pub async fn send_hello(stream: &mut TcpStream, local: &PeerAddress) -> Result<()> {
    let hello = serde_json::to_string(&Handshake::Hello {
        peer: local.clone(),
    })? + "\n";
    stream.write_all(hello.as_bytes()).await?;
    Ok(())
}

/// Read the initiator's hello.
pub async fn read_hello<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<PeerAddress> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(Error::Transport("link closed before hello".into()));
    }
    match serde_json::from_str::<Handshake>(&line) {
        Ok(Handshake::Hello { peer }) => Ok(peer),
        Err(e) => Err(Error::Transport(format!("invalid hello: {e}"))),
    }
}

/// A stream whose remote identity is known: read from the hello when
/// accepting, or the address we dialled.
#[derive(Debug)]
pub struct Established {
    pub peer: PeerAddress,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Established {
    /// Acceptor side: split `stream` and wait for the hello.
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let peer = tokio::time::timeout(HELLO_TIMEOUT, read_hello(&mut reader))
            .await
            .map_err(|_| Error::Transport("timed out waiting for hello".into()))??;
        Ok(Self {
            peer,
            reader,
            writer,
        })
    }

    /// Initiator side, after our hello has been sent.
    pub fn dialled(stream: TcpStream, remote: PeerAddress) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            peer: remote,
            reader: BufReader::new(reader),
            writer,
        }
    }
}

/// Sending half of an open link, owned by the connection manager.
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    peer: PeerAddress,
    state: LinkState,
    outbox: Option<mpsc::UnboundedSender<String>>,
    reader: JoinHandle<()>,
}

impl Link {
    /// Start the link's tasks over an established stream.
    pub fn spawn(id: LinkId, stream: Established, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        let Established {
            peer,
            reader,
            writer,
        } = stream;
        let (outbox, rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(id, writer, rx, events.clone()));
        let reader = tokio::spawn(read_loop(id, reader, events));

        Self {
            id,
            peer,
            state: LinkState::Open,
            outbox: Some(outbox),
            reader,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Queue one line. Fails if the link is no longer open.
    pub fn send(&mut self, line: String) -> Result<()> {
        match &self.outbox {
            Some(outbox) if self.state == LinkState::Open => {
                if outbox.send(line).is_ok() {
                    return Ok(());
                }
                self.state = LinkState::Errored;
                Err(Error::Transport(format!("{} writer has stopped", self.id)))
            }
            _ => Err(Error::Transport(format!("{} is not open", self.id))),
        }
    }

    /// Flush queued lines, then shut the stream down.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.outbox = None;
        self.reader.abort();
        self.state = LinkState::Closed;
        debug!("{} to {} closed locally", self.id, self.peer);
    }

    pub(crate) fn mark(&mut self, state: LinkState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    id: LinkId,
    mut reader: BufReader<OwnedReadHalf>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        let event = match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("{} disconnected", id);
                LinkEvent::Closed { link: id }
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if events
                    .send(LinkEvent::Data {
                        link: id,
                        line: trimmed.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
                continue;
            }
            Err(e) => {
                warn!("Read error from {}: {}", id, e);
                LinkEvent::Errored {
                    link: id,
                    error: e.to_string(),
                }
            }
        };
        let _ = events.send(event);
        return;
    }
}

async fn write_loop(
    id: LinkId,
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    while let Some(line) = outbox.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await
        }
        .await;
        if let Err(e) = written {
            warn!("Write error to {}: {}", id, e);
            let _ = events.send(LinkEvent::Errored {
                link: id,
                error: e.to_string(),
            });
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use savate_session::{JudgeId, SessionCode};
    use tokio::net::TcpListener;

    fn judge_address() -> PeerAddress {
        PeerAddress::judge(JudgeId(17), &SessionCode::parse("4821").unwrap())
    }

    #[tokio::test]
    async fn hello_is_read_from_the_first_line() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"hello\",\"peer\":\"judge_17_4821\"}\n")
            .build();
        let mut reader = BufReader::new(mock);
        assert_eq!(read_hello(&mut reader).await.unwrap(), judge_address());
    }

    #[tokio::test]
    async fn garbage_hello_is_a_transport_error() {
        let mock = tokio_test::io::Builder::new().read(b"hi there\n").build();
        let mut reader = BufReader::new(mock);
        assert!(matches!(read_hello(&mut reader).await, Err(Error::Transport(_))));

        let mock = tokio_test::io::Builder::new().build();
        let mut reader = BufReader::new(mock);
        assert!(matches!(read_hello(&mut reader).await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn lines_flow_both_ways_and_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let dialer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            send_hello(&mut stream, &judge_address()).await.unwrap();
            stream
        });
        let (accepted, _) = listener.accept().await.unwrap();
        let incoming = Established::accept(accepted).await.unwrap();
        assert_eq!(incoming.peer, judge_address());
        let dialled = dialer.await.unwrap();

        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let mut a = Link::spawn(LinkId(1), incoming, a_tx);
        let delegate = PeerAddress::delegate(&SessionCode::parse("4821").unwrap());
        let mut b = Link::spawn(LinkId(2), Established::dialled(dialled, delegate), b_tx);

        a.send("{\"ping\":1}".into()).unwrap();
        b.send("{\"pong\":2}".into()).unwrap();
        assert_eq!(
            b_rx.recv().await.unwrap(),
            LinkEvent::Data {
                link: LinkId(2),
                line: "{\"ping\":1}".into()
            }
        );
        assert_eq!(
            a_rx.recv().await.unwrap(),
            LinkEvent::Data {
                link: LinkId(1),
                line: "{\"pong\":2}".into()
            }
        );

        a.close();
        assert_eq!(a.state(), LinkState::Closed);
        assert!(a.send("late".into()).is_err());
        assert_eq!(a.state(), LinkState::Closed);
        assert_eq!(b_rx.recv().await.unwrap(), LinkEvent::Closed { link: LinkId(2) });
    }
}

//! Rendezvous: peer address registration and lookup.
//!
//! Line-delimited JSON over TCP. A registration lives exactly as long as the
//! connection that made it, so a node that goes away takes its address with
//! it.
//!
//! ```text
//! → {"op":"register","peer_id":"delegate_4821","addr":"127.0.0.1:50312"}
//! ← {"status":"registered"}
//! → {"op":"resolve","peer_id":"delegate_4821"}
//! ← {"status":"resolved","addr":"127.0.0.1:50312"}
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Register { peer_id: String, addr: SocketAddr },
    Resolve { peer_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Registered,
    Resolved { addr: SocketAddr },
    NotFound,
    Error { error: String },
}

type Directory = Arc<RwLock<HashMap<String, SocketAddr>>>;

/// Rendezvous service.
pub struct RendezvousServer {
    listener: TcpListener,
    directory: Directory,
}

impl RendezvousServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            directory: Arc::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!("Rendezvous listening on {}", self.local_addr()?);
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let directory = Arc::clone(&self.directory);
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, &directory).await {
                            warn!("Rendezvous connection {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept rendezvous connection: {}", e);
                }
            }
        }
    }
}

async fn serve(stream: TcpStream, directory: &Directory) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut owned: Vec<String> = Vec::new();
    let mut line = String::new();

    let outcome = async {
        while reader.read_line(&mut line).await? > 0 {
            let reply = match serde_json::from_str::<Request>(&line) {
                Ok(Request::Register { peer_id, addr }) => {
                    let mut dir = directory.write().await;
                    if dir.contains_key(&peer_id) {
                        Reply::Error {
                            error: format!("{peer_id} is already registered"),
                        }
                    } else {
                        info!("Registered {} at {}", peer_id, addr);
                        dir.insert(peer_id.clone(), addr);
                        owned.push(peer_id);
                        Reply::Registered
                    }
                }
                Ok(Request::Resolve { peer_id }) => match directory.read().await.get(&peer_id) {
                    Some(addr) => Reply::Resolved { addr: *addr },
                    None => Reply::NotFound,
                },
                Err(e) => Reply::Error {
                    error: format!("Invalid request: {e}"),
                },
            };
            let reply = serde_json::to_string(&reply)? + "\n";
            writer.write_all(reply.as_bytes()).await?;
            line.clear();
        }
        Ok::<_, Error>(())
    }
    .await;

    if !owned.is_empty() {
        let mut dir = directory.write().await;
        for peer_id in owned {
            dir.remove(&peer_id);
            info!("Unregistered {}", peer_id);
        }
    }
    outcome
}

/// A live registration. Dropping it tears the identity down.
#[derive(Debug)]
pub struct Registration {
    peer_id: String,
    _stream: TcpStream,
}

impl Registration {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}

async fn call(stream: &mut TcpStream, request: &Request) -> Result<Reply> {
    let line = serde_json::to_string(request)? + "\n";
    stream.write_all(line.as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let mut reply = String::new();
    if reader.read_line(&mut reply).await? == 0 {
        return Err(Error::Transport("rendezvous closed the connection".into()));
    }
    Ok(serde_json::from_str(&reply)?)
}

async fn dial(rendezvous: impl ToSocketAddrs) -> Result<TcpStream> {
    TcpStream::connect(rendezvous)
        .await
        .map_err(|e| Error::Transport(format!("rendezvous unreachable: {e}")))
}

/// Register `peer_id` at `addr`. Resolves once the rendezvous acknowledges.
pub async fn register(
    rendezvous: impl ToSocketAddrs,
    peer_id: &str,
    addr: SocketAddr,
) -> Result<Registration> {
    let mut stream = dial(rendezvous).await?;
    let request = Request::Register {
        peer_id: peer_id.to_string(),
        addr,
    };
    match call(&mut stream, &request).await? {
        Reply::Registered => {
            debug!("{} registered at {}", peer_id, addr);
            Ok(Registration {
                peer_id: peer_id.to_string(),
                _stream: stream,
            })
        }
        Reply::Error { error } => Err(Error::Transport(error)),
        other => Err(Error::Transport(format!("unexpected reply: {other:?}"))),
    }
}

/// Look up the address `peer_id` is registered at.
pub async fn resolve(rendezvous: impl ToSocketAddrs, peer_id: &str) -> Result<Option<SocketAddr>> {
    let mut stream = dial(rendezvous).await?;
    let request = Request::Resolve {
        peer_id: peer_id.to_string(),
    };
    match call(&mut stream, &request).await? {
        Reply::Resolved { addr } => Ok(Some(addr)),
        Reply::NotFound => Ok(None),
        Reply::Error { error } => Err(Error::Transport(error)),
        other => Err(Error::Transport(format!("unexpected reply: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn start() -> SocketAddr {
        let server = RendezvousServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    #[tokio::test]
    async fn register_then_resolve() {
        let rendezvous = start().await;
        let target: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        let registration = register(rendezvous, "delegate_4821", target).await.unwrap();
        assert_eq!(registration.peer_id(), "delegate_4821");
        assert_eq!(resolve(rendezvous, "delegate_4821").await.unwrap(), Some(target));
        assert_eq!(resolve(rendezvous, "delegate_1111").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_registration_is_refused() {
        let rendezvous = start().await;
        let target: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let _first = register(rendezvous, "judge_1_4821", target).await.unwrap();
        let second = register(rendezvous, "judge_1_4821", target).await;
        assert!(matches!(second, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn dropping_registration_frees_the_address() {
        let rendezvous = start().await;
        let target: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let registration = register(rendezvous, "delegate_4821", target).await.unwrap();
        drop(registration);

        let mut freed = false;
        for _ in 0..50 {
            if resolve(rendezvous, "delegate_4821").await.unwrap().is_none() {
                freed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(freed);
        assert!(register(rendezvous, "delegate_4821", target).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_rendezvous_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = resolve(addr, "delegate_4821").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

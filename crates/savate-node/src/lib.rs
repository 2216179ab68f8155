//! Savate Node - live bout scoring between a delegate and its judges
//!
//! One device hosts the session as the delegate; each judge device joins it
//! with the 4-digit access code and scores the bout locally. Judges push their
//! full record to the delegate after every change, and the delegate mirrors
//! the records, aggregates them and drives resets.
//!
//! # Architecture
//!
//! - **Rendezvous**: peer-id → address directory (`savate-rendezvous`)
//! - **Link / Connection**: TCP links carrying line-delimited envelopes
//! - **Delegate / Judge**: synchronous role cores fed by the dispatcher
//! - **Node**: the event loop that owns a core and its links
//! - **Control Socket**: Unix socket for local commands (`savate-ctl`)
//!
//! # Example
//!
//! ```no_run
//! use savate_node::{NodeConfig, ScoringNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let (mut node, _handle) = ScoringNode::start(&config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod control;
pub mod delegate;
pub mod error;
pub mod judge;
pub mod link;
pub mod node;
pub mod rendezvous;

pub use config::{JudgeAccess, NodeConfig, RendezvousConfig};
pub use connection::ConnectionManager;
pub use control::{ControlCommand, ControlResponse, ControlSocket};
pub use delegate::{Delegate, FinalResult, JudgeVote};
pub use error::{Error, Result};
pub use judge::Judge;
pub use link::{LinkEvent, LinkId, LinkState};
pub use node::{Connectivity, Core, NodeHandle, NodeStatus, RunOutcome, ScoringNode};
pub use rendezvous::RendezvousServer;

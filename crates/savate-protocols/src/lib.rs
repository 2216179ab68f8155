//! Savate Protocols - Delegate/Judge Message Protocol
//!
//! Typed envelopes exchanged over peer links, plus the dispatcher that
//! decodes them and hands them to a node core.
//!
//! # Messages
//!
//! | type | direction | routing |
//! |------|-----------|---------|
//! | `judge_info` | judge → delegate | single link |
//! | `judge_data` | judge → delegate | single link |
//! | `fighter_names` | delegate → judges | broadcast |
//! | `session_config` | delegate → judge | unicast, on join |
//! | `sync_request` | judge → delegate | single link |
//! | `full_sync` | delegate → judge | unicast |
//! | `reset_partial` | delegate → judges | broadcast |
//! | `reset_complete` | delegate → judges | broadcast |
//!
//! Every envelope is stamped with `timestamp`, `priority` and `sessionId`
//! when it is sent. Unknown types are ignored.

pub mod dispatch;
pub mod error;
pub mod message;

pub use dispatch::{DispatchStats, Dispatcher, Handler, Outbound, Target};
pub use error::{Error, Result};
pub use message::{
    Delivery, Envelope, FullSync, JudgeInfo, Message, MessageKind, Priority, SessionConfig,
};

//! Message types and the envelope they travel in.
//!
//! Wire form, one JSON object per line:
//!
//! ```text
//! {"type":"fighter_names","data":{"red":"Dupont","blue":"Martin"},
//!  "timestamp":1718000000000,"priority":"normal","sessionId":"session_..."}
//! ```

use std::fmt;

use savate_scoring::JudgeRecord;
use savate_session::{now_millis, FightType, Fighters, JudgeId, Session, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// What a judge announces about itself when its link opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeInfo {
    pub id: JudgeId,
    pub name: String,
    pub number: String,
    pub connected: bool,
    pub last_update_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub fight_type: FightType,
    pub round_count: u8,
    pub fighters: Fighters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSync {
    pub session: Session,
    pub fighters: Fighters,
    pub judges: Vec<JudgeRecord>,
}

/// The closed set of messages exchanged between a delegate and its judges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    JudgeInfo(JudgeInfo),
    JudgeData(JudgeRecord),
    FighterNames(Fighters),
    SessionConfig(SessionConfig),
    SyncRequest {},
    FullSync(FullSync),
    ResetPartial {},
    ResetComplete {},
}

/// Discriminant of [`Message`], usable without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    JudgeInfo,
    JudgeData,
    FighterNames,
    SessionConfig,
    SyncRequest,
    FullSync,
    ResetPartial,
    ResetComplete,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        Self::JudgeInfo,
        Self::JudgeData,
        Self::FighterNames,
        Self::SessionConfig,
        Self::SyncRequest,
        Self::FullSync,
        Self::ResetPartial,
        Self::ResetComplete,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JudgeInfo => "judge_info",
            Self::JudgeData => "judge_data",
            Self::FighterNames => "fighter_names",
            Self::SessionConfig => "session_config",
            Self::SyncRequest => "sync_request",
            Self::FullSync => "full_sync",
            Self::ResetPartial => "reset_partial",
            Self::ResetComplete => "reset_complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Score updates and resets jump the queue on the receiving side.
    pub const fn default_priority(self) -> Priority {
        match self {
            Self::JudgeData | Self::ResetPartial | Self::ResetComplete => Priority::High,
            _ => Priority::Normal,
        }
    }

    pub const fn delivery(self) -> Delivery {
        match self {
            Self::SessionConfig | Self::FullSync => Delivery::Unicast,
            _ => Delivery::Broadcast,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::JudgeInfo(_) => MessageKind::JudgeInfo,
            Self::JudgeData(_) => MessageKind::JudgeData,
            Self::FighterNames(_) => MessageKind::FighterNames,
            Self::SessionConfig(_) => MessageKind::SessionConfig,
            Self::SyncRequest {} => MessageKind::SyncRequest,
            Self::FullSync(_) => MessageKind::FullSync,
            Self::ResetPartial {} => MessageKind::ResetPartial,
            Self::ResetComplete {} => MessageKind::ResetComplete,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// How a message type is routed by its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// To the one link that asked for it.
    Unicast,
    /// To every open link.
    Broadcast,
}

/// A message stamped for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub message: Message,
    pub timestamp: u64,
    pub priority: Priority,
    pub session_id: SessionId,
}

/// Raw line shape. `data` stays untyped until `type` is known.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    timestamp: u64,
    #[serde(default)]
    priority: Priority,
    session_id: SessionId,
}

impl Envelope {
    /// Stamp with the current time and the message's default priority.
    pub fn stamp(message: Message, session_id: &SessionId) -> Self {
        let priority = message.kind().default_priority();
        Self {
            message,
            timestamp: now_millis(),
            priority,
            session_id: session_id.clone(),
        }
    }

    /// One JSON line, without the trailing newline.
    pub fn encode(&self) -> Result<String> {
        let data = match serde_json::to_value(&self.message)? {
            Value::Object(mut tagged) => tagged.remove("data"),
            _ => None,
        };
        let frame = Frame {
            kind: self.message.kind().as_str().to_string(),
            data: data.unwrap_or_else(|| Value::Object(Default::default())),
            timestamp: self.timestamp,
            priority: self.priority,
            session_id: self.session_id.clone(),
        };
        Ok(serde_json::to_string(&frame)?)
    }

    /// Parse one line. Unknown types and bad payloads are told apart so the
    /// caller can log them differently.
    pub fn decode(line: &str) -> Result<Self> {
        let frame: Frame = serde_json::from_str(line)?;
        let kind = MessageKind::parse(&frame.kind)
            .ok_or_else(|| Error::UnknownMessageType(frame.kind.clone()))?;

        let data = match frame.data {
            Value::Null => Value::Object(Default::default()),
            data => data,
        };
        let tagged = serde_json::json!({ "type": kind.as_str(), "data": data });
        let message = serde_json::from_value(tagged).map_err(|source| Error::Malformed {
            kind: kind.as_str(),
            source,
        })?;

        Ok(Self {
            message,
            timestamp: frame.timestamp,
            priority: frame.priority,
            session_id: frame.session_id,
        })
    }
}

//! Session model and the context handed to every component.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Field, Invalid, Result};
use crate::fight::{FightType, Ruleset};
use crate::identity::{JudgeId, PeerAddress, SessionCode};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique session identifier: `session_<millis>_<seq><random>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Self(format!("session_{}_{seq}{suffix}", now_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Delegate,
    Judge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

/// A bout session as seen by one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub code: SessionCode,
    pub role: Role,
    pub fight_type: FightType,
    pub round_count: u8,
    pub status: SessionStatus,
    pub start_time: u64,
}

impl Session {
    pub fn ruleset(&self) -> Ruleset {
        self.fight_type.ruleset()
    }
}

/// Fighter names per corner. Empty means "not yet entered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fighters {
    pub red: String,
    pub blue: String,
}

impl Fighters {
    pub fn new(red: impl Into<String>, blue: impl Into<String>) -> Self {
        Self {
            red: red.into(),
            blue: blue.into(),
        }
    }
}

/// What a judge typed on the access form, once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeProfile {
    pub id: JudgeId,
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalIdentity {
    Delegate { judge_count: u8 },
    Judge(JudgeProfile),
}

/// Explicit session state passed to every component constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session: Session,
    pub identity: LocalIdentity,
}

impl SessionContext {
    pub fn role(&self) -> Role {
        self.session.role
    }

    /// Address this device registers on the rendezvous.
    pub fn local_address(&self) -> PeerAddress {
        match &self.identity {
            LocalIdentity::Delegate { .. } => PeerAddress::delegate(&self.session.code),
            LocalIdentity::Judge(profile) => PeerAddress::judge(profile.id, &self.session.code),
        }
    }

    /// The delegate a judge links to.
    pub fn delegate_address(&self) -> PeerAddress {
        PeerAddress::delegate(&self.session.code)
    }

    pub fn judge_profile(&self) -> Option<&JudgeProfile> {
        match &self.identity {
            LocalIdentity::Judge(profile) => Some(profile),
            LocalIdentity::Delegate { .. } => None,
        }
    }

    /// Judge-side: take the delegate's fight type (from `session_config`).
    /// Returns true if the round count or ruleset changed.
    pub fn adopt_fight_type(&mut self, fight_type: FightType, round_count: u8) -> bool {
        let changed = self.session.round_count != round_count
            || self.session.fight_type.ruleset() != fight_type.ruleset();
        self.session.fight_type = fight_type;
        self.session.round_count = round_count;
        changed
    }

    /// Judge-side: replace the local replica with the delegate's session
    /// (from `full_sync`). Code and role stay local.
    pub fn adopt_session(&mut self, remote: &Session) -> bool {
        let changed = self.adopt_fight_type(remote.fight_type, remote.round_count);
        self.session.id = remote.id.clone();
        self.session.start_time = remote.start_time;
        self.session.status = remote.status;
        changed
    }
}

/// Judge counts a delegate may announce.
pub const JUDGE_COUNTS: [u8; 2] = [3, 5];

/// Create a new session hosted by this device.
pub fn create_session(fight_type: FightType, judge_count: u8) -> Result<SessionContext> {
    if !JUDGE_COUNTS.contains(&judge_count) {
        return Err(Error::Validation(vec![Invalid {
            field: Field::JudgeCount,
            reason: "must be 3 or 5",
        }]));
    }

    Ok(SessionContext {
        session: Session {
            id: SessionId::generate(),
            code: SessionCode::generate(),
            role: Role::Delegate,
            fight_type,
            round_count: fight_type.round_count(),
            status: SessionStatus::Waiting,
            start_time: now_millis(),
        },
        identity: LocalIdentity::Delegate { judge_count },
    })
}

/// Validate the judge access form and build the judge's session context.
///
/// The fight type is provisional until the delegate's `session_config`
/// arrives.
pub fn join_session(code: &str, judge_name: &str, judge_number: &str) -> Result<SessionContext> {
    let code = code.trim();
    let judge_name = judge_name.trim();
    let judge_number = judge_number.trim();

    let mut invalid = Vec::new();
    if code.is_empty() {
        invalid.push(Invalid { field: Field::AccessCode, reason: "is required" });
    } else if !crate::identity::is_access_code(code) {
        invalid.push(Invalid { field: Field::AccessCode, reason: "must be exactly 4 digits" });
    }
    if judge_name.is_empty() {
        invalid.push(Invalid { field: Field::JudgeName, reason: "is required" });
    } else if judge_name.chars().count() < 2 {
        invalid.push(Invalid { field: Field::JudgeName, reason: "is too short" });
    }
    if judge_number.is_empty() {
        invalid.push(Invalid { field: Field::JudgeNumber, reason: "is required" });
    }
    if !invalid.is_empty() {
        return Err(Error::Validation(invalid));
    }

    let code = SessionCode::parse(code)?;
    let fight_type = FightType::Assaut;
    Ok(SessionContext {
        session: Session {
            id: SessionId::generate(),
            code,
            role: Role::Judge,
            fight_type,
            round_count: fight_type.round_count(),
            status: SessionStatus::Active,
            start_time: now_millis(),
        },
        identity: LocalIdentity::Judge(JudgeProfile {
            id: JudgeId::random(),
            name: judge_name.to_string(),
            number: judge_number.to_string(),
        }),
    })
}

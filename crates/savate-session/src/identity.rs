//! Access codes, judge ids and peer addresses.
//!
//! Addresses are what a device registers with the rendezvous service:
//!
//! ```text
//! delegate_<code>            the device hosting the bout
//! judge_<judgeId>_<code>     a judge device, judgeId in [1, 1000]
//! ```
//!
//! Judge ids are self-chosen at random and never checked for uniqueness.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Field, Invalid};

/// Four ASCII digits shared out-of-band by the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Generate a code in 1000..=9999. Not unique across sessions.
    pub fn generate() -> Self {
        let n: u16 = rand::thread_rng().gen_range(1000..=9999);
        Self(n.to_string())
    }

    /// Validate against `^\d{4}$`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if is_access_code(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::Validation(vec![Invalid {
                field: Field::AccessCode,
                reason: "must be exactly 4 digits",
            }]))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `^\d{4}$` over ASCII digits.
pub fn is_access_code(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

/// Self-assigned judge identifier in [1, 1000].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JudgeId(pub u16);

impl JudgeId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 1000;

    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(Self::MIN..=Self::MAX))
    }
}

impl fmt::Display for JudgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressable identity on the rendezvous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerAddress {
    Delegate { code: SessionCode },
    Judge { judge: JudgeId, code: SessionCode },
}

impl PeerAddress {
    pub fn delegate(code: &SessionCode) -> Self {
        Self::Delegate { code: code.clone() }
    }

    pub fn judge(judge: JudgeId, code: &SessionCode) -> Self {
        Self::Judge {
            judge,
            code: code.clone(),
        }
    }

    pub fn code(&self) -> &SessionCode {
        match self {
            Self::Delegate { code } | Self::Judge { code, .. } => code,
        }
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self, Self::Delegate { .. })
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delegate { code } => write!(f, "delegate_{code}"),
            Self::Judge { judge, code } => write!(f, "judge_{judge}_{code}"),
        }
    }
}

impl FromStr for PeerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAddress(s.to_string());
        let mut parts = s.split('_');
        let address = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("delegate"), Some(code), None, None) => Self::Delegate {
                code: SessionCode::parse(code).map_err(|_| invalid())?,
            },
            (Some("judge"), Some(id), Some(code), None) => {
                let id: u16 = id.parse().map_err(|_| invalid())?;
                Self::Judge {
                    judge: JudgeId(id),
                    code: SessionCode::parse(code).map_err(|_| invalid())?,
                }
            }
            _ => return Err(invalid()),
        };
        Ok(address)
    }
}

impl Serialize for PeerAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

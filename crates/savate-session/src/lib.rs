//! Savate Session - Identity & Session Model
//!
//! Holds everything a device knows about the bout it is part of: the session
//! code shared with judges, the local role, the fight category and the round
//! count it implies, and the peer addresses used on the rendezvous.
//!
//! # Example
//!
//! ```
//! use savate_session::{create_session, join_session, FightType};
//!
//! let delegate = create_session(FightType::Combat1Seniors, 3).unwrap();
//! assert_eq!(delegate.session.round_count, 5);
//!
//! let judge = join_session(delegate.session.code.as_str(), "Martin", "1").unwrap();
//! assert_eq!(judge.delegate_address(), delegate.local_address());
//! ```

pub mod error;
pub mod fight;
pub mod identity;
pub mod session;

pub use error::{Error, Field, Invalid, Result};
pub use fight::{FightType, Ruleset};
pub use identity::{is_access_code, JudgeId, PeerAddress, SessionCode};
pub use session::{
    create_session, join_session, now_millis, Fighters, JudgeProfile, LocalIdentity, Role,
    Session, SessionContext, SessionId, SessionStatus, JUDGE_COUNTS,
};

//! Node and rendezvous configuration, read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use savate_session::{create_session, join_session, FightType, Role, SessionContext};

use crate::error::{Error, Result};

/// What a judge typed on the access form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JudgeAccess {
    pub code: String,
    pub name: String,
    pub number: String,
}

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub role: Role,

    /// Rendezvous service address (host:port)
    pub rendezvous: String,

    /// Local address peer links are accepted on
    pub listen_addr: SocketAddr,

    /// Address published on the rendezvous. Defaults to the bound listen
    /// address, with an unspecified IP replaced by loopback.
    pub advertise_addr: Option<SocketAddr>,

    /// Delegate only
    pub fight_type: FightType,

    /// Delegate only
    pub judge_count: u8,

    /// Judge only
    pub judge: JudgeAccess,

    /// Control socket path (for savate-ctl)
    pub control_socket: PathBuf,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let role = match var("SAVATE_ROLE", "delegate").trim() {
            "delegate" => Role::Delegate,
            "judge" => Role::Judge,
            other => {
                return Err(Error::Validation(format!(
                    "SAVATE_ROLE must be delegate or judge, got {other:?}"
                )))
            }
        };

        let listen_addr = parse_addr("SAVATE_LISTEN_ADDR", &var("SAVATE_LISTEN_ADDR", "0.0.0.0:0"))?;
        let advertise_addr = lookup("SAVATE_ADVERTISE_ADDR")
            .map(|s| parse_addr("SAVATE_ADVERTISE_ADDR", &s))
            .transpose()?;

        let fight_type: FightType = var("SAVATE_FIGHT_TYPE", "assaut").parse()?;
        let judge_count = var("SAVATE_JUDGE_COUNT", "3")
            .trim()
            .parse::<u8>()
            .map_err(|e| Error::Validation(format!("SAVATE_JUDGE_COUNT: {e}")))?;

        let judge = JudgeAccess {
            code: var("SAVATE_CODE", ""),
            name: var("SAVATE_JUDGE_NAME", ""),
            number: var("SAVATE_JUDGE_NUMBER", ""),
        };

        Ok(Self {
            role,
            rendezvous: var("SAVATE_RENDEZVOUS", "127.0.0.1:7400"),
            listen_addr,
            advertise_addr,
            fight_type,
            judge_count,
            judge,
            control_socket: PathBuf::from(var(
                "SAVATE_CONTROL_SOCKET",
                "./savate-data/control.sock",
            )),
        })
    }

    /// Build the session this node hosts or joins.
    pub fn session_context(&self) -> Result<SessionContext> {
        let ctx = match self.role {
            Role::Delegate => create_session(self.fight_type, self.judge_count)?,
            Role::Judge => join_session(&self.judge.code, &self.judge.name, &self.judge.number)?,
        };
        Ok(ctx)
    }

    /// Address to publish once the listener is bound.
    pub fn advertised(&self, bound: SocketAddr) -> SocketAddr {
        self.advertise_addr.unwrap_or_else(|| {
            if bound.ip().is_unspecified() {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
            } else {
                bound
            }
        })
    }
}

/// Rendezvous service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousConfig {
    pub listen_addr: SocketAddr,
}

impl RendezvousConfig {
    pub fn from_env() -> Result<Self> {
        let addr = std::env::var("SAVATE_RENDEZVOUS_ADDR").unwrap_or_else(|_| "0.0.0.0:7400".to_string());
        Ok(Self {
            listen_addr: parse_addr("SAVATE_RENDEZVOUS_ADDR", &addr)?,
        })
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Validation(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<NodeConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_describe_a_local_delegate() {
        let config = config(&[]).unwrap();
        assert_eq!(config.role, Role::Delegate);
        assert_eq!(config.rendezvous, "127.0.0.1:7400");
        assert_eq!(config.fight_type, FightType::Assaut);
        assert_eq!(config.judge_count, 3);
        assert_eq!(config.control_socket, PathBuf::from("./savate-data/control.sock"));

        let ctx = config.session_context().unwrap();
        assert_eq!(ctx.session.round_count, 3);
    }

    #[test]
    fn judge_role_validates_the_access_form() {
        let config = config(&[("SAVATE_ROLE", "judge"), ("SAVATE_CODE", "12")]).unwrap();
        let err = config.session_context().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("access code"), "{message}");
        assert!(message.contains("judge name"), "{message}");
        assert!(message.contains("judge number"), "{message}");
    }

    #[test]
    fn invalid_values_are_validation_errors() {
        assert!(matches!(config(&[("SAVATE_ROLE", "referee")]), Err(Error::Validation(_))));
        assert!(matches!(config(&[("SAVATE_FIGHT_TYPE", "boxe")]), Err(Error::Validation(_))));
        assert!(matches!(config(&[("SAVATE_LISTEN_ADDR", "nowhere")]), Err(Error::Validation(_))));
        assert!(matches!(config(&[("SAVATE_JUDGE_COUNT", "three")]), Err(Error::Validation(_))));

        let config = config(&[("SAVATE_JUDGE_COUNT", "4")]).unwrap();
        assert!(matches!(config.session_context(), Err(Error::Validation(_))));
    }

    #[test]
    fn unspecified_listen_ip_advertises_loopback() {
        let config = config(&[]).unwrap();
        let bound: SocketAddr = "0.0.0.0:5555".parse().unwrap();
        assert_eq!(config.advertised(bound), "127.0.0.1:5555".parse().unwrap());

        let config = NodeConfig {
            advertise_addr: Some("10.0.0.2:9000".parse().unwrap()),
            ..config
        };
        assert_eq!(config.advertised(bound), "10.0.0.2:9000".parse().unwrap());
    }
}

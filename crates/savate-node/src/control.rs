//! Unix socket server for local control commands.
//!
//! Stands in for the display layer: each line is one JSON command, answered
//! by one JSON response once the node loop has applied it.

use std::path::{Path, PathBuf};

use savate_scoring::{Corner, JudgeRecord, Recap};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info};

use crate::delegate::FinalResult;
use crate::error::Result;
use crate::node::{NodeHandle, NodeStatus};

/// Control command sent over the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Enter or clear a corner's score for a round (judge)
    SetScore {
        round: u8,
        corner: Corner,
        #[serde(default)]
        value: Option<u8>,
    },
    /// Judge
    ToggleWarning { corner: Corner, round: u8 },
    /// Judge, combat only
    ToggleCount { corner: Corner, round: u8 },
    /// Judge
    ToggleAbandon { corner: Corner },
    /// Judge
    SetBonus { corner: Corner, value: u8 },
    /// Undo the last scoring event (judge) or name edit (delegate)
    Undo,
    /// Ask the delegate for a full sync, or look for it again (judge)
    Sync,
    /// Delegate
    SetFighters { red: String, blue: String },
    /// Delegate
    ResetPartial,
    /// Delegate
    ResetComplete,
    /// Delegate: round-by-round recap and final result
    Recap,
    Status,
    /// Ping (health check)
    Ping,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetScore { .. } => "set_score",
            Self::ToggleWarning { .. } => "toggle_warning",
            Self::ToggleCount { .. } => "toggle_count",
            Self::ToggleAbandon { .. } => "toggle_abandon",
            Self::SetBonus { .. } => "set_bonus",
            Self::Undo => "undo",
            Self::Sync => "sync",
            Self::SetFighters { .. } => "set_fighters",
            Self::ResetPartial => "reset_partial",
            Self::ResetComplete => "reset_complete",
            Self::Recap => "recap",
            Self::Status => "status",
            Self::Ping => "ping",
        }
    }
}

/// Response to a control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Ok { message: String },
    Error { error: String },
    Record { record: JudgeRecord, equality_warning: bool },
    Recap { recap: Recap, result: FinalResult },
    Status { node: NodeStatus },
    Pong,
}

/// Control socket server.
pub struct ControlSocket {
    handle: NodeHandle,
    socket_path: PathBuf,
}

impl ControlSocket {
    pub fn new(handle: NodeHandle, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one. Connections are served until
    /// the task is dropped.
    pub async fn run(self) -> Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("Control socket listening on {}", self.socket_path.display());

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handle = self.handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handle).await {
                            error!("Control connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept control connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, handle: NodeHandle) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<ControlCommand>(&line) {
            Ok(command) => match handle.request(command).await {
                Ok(response) => response,
                Err(e) => ControlResponse::Error {
                    error: e.to_string(),
                },
            },
            Err(e) => ControlResponse::Error {
                error: format!("Invalid command: {e}"),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Connectivity;
    use savate_session::{FightType, Fighters, Role, SessionStatus};

    #[test]
    fn commands_use_a_cmd_tag() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{"cmd":"set_score","round":2,"corner":"blue","value":3}"#).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetScore {
                round: 2,
                corner: Corner::Blue,
                value: Some(3)
            }
        );
        let clear: ControlCommand =
            serde_json::from_str(r#"{"cmd":"set_score","round":2,"corner":"red"}"#).unwrap();
        assert!(matches!(clear, ControlCommand::SetScore { value: None, .. }));
        assert_eq!(
            serde_json::from_str::<ControlCommand>(r#"{"cmd":"reset_partial"}"#).unwrap(),
            ControlCommand::ResetPartial
        );
    }

    #[test]
    fn names_match_the_wire_tag() {
        let cmd = ControlCommand::ToggleCount {
            corner: Corner::Red,
            round: 1,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["cmd"], cmd.name());
        let json = serde_json::to_value(ControlCommand::Ping).unwrap();
        assert_eq!(json["cmd"], "ping");
    }

    #[test]
    fn responses_use_a_status_tag() {
        let json = serde_json::to_string(&ControlResponse::Pong).unwrap();
        assert_eq!(json, r#"{"status":"pong"}"#);
        let json = serde_json::to_value(ControlResponse::Error {
            error: "nope".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "nope");
    }

    #[test]
    fn status_response_keeps_its_tag_and_payload() {
        let node = NodeStatus {
            role: Role::Delegate,
            peer: "127.0.0.1:4000".into(),
            code: "4821".into(),
            session_id: "s-1".into(),
            session_status: SessionStatus::Active,
            fight_type: FightType::Assaut,
            round_count: 3,
            fighters: Fighters::new("Dupont", "Durand"),
            connectivity: Connectivity::WaitingForJudges,
            links: 0,
            judges_connected: Some(0),
            judges_expected: Some(3),
            last_sync: None,
            received: 0,
            dropped: 0,
        };
        let response = ControlResponse::Status { node: node.clone() };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "status");
        assert_eq!(json["node"]["code"], "4821");
        assert_eq!(json["node"]["connectivity"], "waiting_for_judges");

        let line = serde_json::to_string(&response).unwrap();
        match serde_json::from_str::<ControlResponse>(&line).unwrap() {
            ControlResponse::Status { node: parsed } => assert_eq!(parsed, node),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_command_does_not_parse() {
        assert!(serde_json::from_str::<ControlCommand>(r#"{"cmd":"add_admin"}"#).is_err());
    }
}

//! End-to-end: a rendezvous, a delegate and three judges on loopback.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use savate_node::{
    Connectivity, ControlCommand, ControlResponse, ControlSocket, JudgeAccess, NodeConfig,
    NodeHandle, NodeStatus, RendezvousServer, RunOutcome, ScoringNode,
};
use savate_scoring::{Corner, JudgeRecord, Recap};
use savate_session::{FightType, Fighters, Role, SessionStatus};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

type Running = JoinHandle<savate_node::Result<RunOutcome>>;

async fn rendezvous() -> String {
    let server = RendezvousServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr.to_string()
}

fn config(rendezvous: &str, role: Role, judge: JudgeAccess) -> NodeConfig {
    NodeConfig {
        role,
        rendezvous: rendezvous.to_string(),
        listen_addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
        advertise_addr: None,
        fight_type: FightType::Assaut,
        judge_count: 3,
        judge,
        control_socket: PathBuf::from("unused.sock"),
    }
}

async fn spawn_node(config: &NodeConfig) -> savate_node::Result<(NodeHandle, Running)> {
    let (mut node, handle) = ScoringNode::start(config).await?;
    Ok((handle, tokio::spawn(async move { node.run().await })))
}

/// Judge ids are random, so a taken peer id is retried with a fresh one.
async fn spawn_judge(rendezvous: &str, code: &str, name: &str) -> (NodeHandle, Running) {
    let access = JudgeAccess {
        code: code.to_string(),
        name: name.to_string(),
        number: "1".to_string(),
    };
    let config = config(rendezvous, Role::Judge, access);
    for _ in 0..5 {
        if let Ok(started) = spawn_node(&config).await {
            return started;
        }
    }
    panic!("judge {name} could not start");
}

async fn status(handle: &NodeHandle) -> NodeStatus {
    match handle.request(ControlCommand::Status).await.unwrap() {
        ControlResponse::Status { node } => node,
        other => panic!("unexpected {other:?}"),
    }
}

async fn recap(handle: &NodeHandle) -> Recap {
    match handle.request(ControlCommand::Recap).await.unwrap() {
        ControlResponse::Recap { recap, .. } => recap,
        other => panic!("unexpected {other:?}"),
    }
}

async fn record(handle: &NodeHandle, command: ControlCommand) -> JudgeRecord {
    match handle.request(command).await.unwrap() {
        ControlResponse::Record { record, .. } => record,
        other => panic!("unexpected {other:?}"),
    }
}

/// Poll `check` until it holds, failing after five seconds.
async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

async fn score_bout(judge: &NodeHandle, rounds: [(u8, u8); 3]) -> JudgeRecord {
    let mut last = None;
    for (i, (red, blue)) in rounds.into_iter().enumerate() {
        let round = i as u8 + 1;
        record(judge, ControlCommand::SetScore { round, corner: Corner::Red, value: Some(red) }).await;
        last = Some(
            record(judge, ControlCommand::SetScore { round, corner: Corner::Blue, value: Some(blue) })
                .await,
        );
    }
    last.unwrap()
}

#[tokio::test]
async fn delegate_aggregates_three_judges() {
    let rendezvous = rendezvous().await;
    let (delegate, delegate_run) = spawn_node(&config(&rendezvous, Role::Delegate, JudgeAccess::default()))
        .await
        .unwrap();
    let code = status(&delegate).await.code;

    let mut judges = Vec::new();
    for name in ["Martin", "Bernard", "Petit"] {
        judges.push(spawn_judge(&rendezvous, &code, name).await);
    }

    eventually("three judges", || async { status(&delegate).await.judges_connected == Some(3) }).await;
    let hosted = status(&delegate).await;
    assert_eq!(hosted.connectivity, Connectivity::Connected);
    assert_eq!(hosted.session_status, SessionStatus::Active);
    for (judge, _) in &judges {
        let s = status(judge).await;
        assert_eq!(s.connectivity, Connectivity::Connected);
        assert_eq!(s.session_id, hosted.session_id);
    }

    let names = Fighters::new("Dupont", "Durand");
    let response = delegate
        .request(ControlCommand::SetFighters {
            red: " Dupont ".into(),
            blue: "Durand".into(),
        })
        .await
        .unwrap();
    assert!(matches!(response, ControlResponse::Ok { .. }));
    for (judge, _) in &judges {
        eventually("fighter names", || async { status(judge).await.fighters == names }).await;
    }

    let first = score_bout(&judges[0].0, [(3, 2), (3, 2), (3, 2)]).await;
    assert_eq!(first.decision, "VICTOIRE Dupont (9-6)");
    score_bout(&judges[1].0, [(3, 2), (2, 2), (3, 1)]).await;
    let third = score_bout(&judges[2].0, [(2, 3), (2, 3), (2, 3)]).await;
    assert_eq!(third.decision, "VICTOIRE Durand (9-6)");

    eventually("all scorecards", || async {
        let recap = recap(&delegate).await;
        recap.grand_total.red == 9 + 8 + 6 && recap.grand_total.blue == 6 + 5 + 9
    })
    .await;
    let result = match delegate.request(ControlCommand::Recap).await.unwrap() {
        ControlResponse::Recap { recap, result } => {
            assert_eq!(recap.rounds.len(), 3);
            assert_eq!(recap.rounds[0].judges.len(), 3);
            assert_eq!(recap.grand_total.red, 9 + 8 + 6);
            result
        }
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(result.winner, "VICTOIRE Dupont");
    assert_eq!(result.majority, 2);
    assert_eq!(result.summary, "Majorité: 2 sur 3 juges");

    // Partial reset: scores and names go, judges stay.
    let response = delegate.request(ControlCommand::ResetPartial).await.unwrap();
    assert!(matches!(response, ControlResponse::Ok { .. }));
    for (judge, _) in &judges {
        eventually("names cleared", || async { status(judge).await.fighters == Fighters::default() }).await;
    }
    let fresh = record(
        &judges[0].0,
        ControlCommand::SetScore { round: 2, corner: Corner::Blue, value: Some(3) },
    )
    .await;
    assert_eq!(fresh.totals.total.red, 0);
    assert_eq!(fresh.totals.total.blue, 3);
    assert_eq!(status(&delegate).await.judges_connected, Some(3));

    // Complete reset: the delegate restarts, judges leave.
    let response = delegate.request(ControlCommand::ResetComplete).await.unwrap();
    assert!(matches!(response, ControlResponse::Ok { .. }));
    assert_eq!(delegate_run.await.unwrap().unwrap(), RunOutcome::Reset);
    for (_, run) in judges {
        let outcome = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap();
        assert_eq!(outcome.unwrap().unwrap(), RunOutcome::SessionEnded);
    }
}

#[tokio::test]
async fn name_undo_and_sync_reach_the_judge() {
    let rendezvous = rendezvous().await;
    let (delegate, _delegate_run) = spawn_node(&config(&rendezvous, Role::Delegate, JudgeAccess::default()))
        .await
        .unwrap();
    let code = status(&delegate).await.code;
    let (judge, _judge_run) = spawn_judge(&rendezvous, &code, "Martin").await;
    eventually("judge link", || async { status(&delegate).await.judges_connected == Some(1) }).await;

    let scored = score_bout(&judge, [(3, 2), (2, 2), (2, 2)]).await;
    assert_eq!(scored.decision, "VICTOIRE ROUGE (7-6)");

    for (red, blue) in [("Dupont", "Durand"), ("Lefebvre", "Moreau")] {
        delegate
            .request(ControlCommand::SetFighters { red: red.into(), blue: blue.into() })
            .await
            .unwrap();
    }
    match delegate.request(ControlCommand::Undo).await.unwrap() {
        ControlResponse::Ok { message } => assert!(message.contains("MODIFICATION NOMS TIREURS")),
        other => panic!("unexpected {other:?}"),
    }
    let restored = Fighters::new("Dupont", "Durand");
    eventually("restored names", || async { status(&judge).await.fighters == restored }).await;
    eventually("re-derived decision", || async {
        recap(&delegate)
            .await
            .judges
            .first()
            .map_or(false, |line| line.decision == "VICTOIRE Dupont (7-6)")
    })
    .await;

    let response = judge.request(ControlCommand::Sync).await.unwrap();
    assert!(matches!(response, ControlResponse::Record { .. }));
    eventually("full sync", || async { status(&judge).await.last_sync.is_some() }).await;
    assert!(matches!(
        judge.request(ControlCommand::ResetPartial).await.unwrap(),
        ControlResponse::Error { .. }
    ));
}

async fn ask<R, W>(lines: &mut tokio::io::Lines<R>, writer: &mut W, command: &str) -> ControlResponse
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_all(format!("{command}\n").as_bytes()).await.unwrap();
    let line = lines.next_line().await.unwrap().expect("response line");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn control_socket_answers_line_commands() {
    let rendezvous = rendezvous().await;
    let (delegate, _run) = spawn_node(&config(&rendezvous, Role::Delegate, JudgeAccess::default()))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("savate-data").join("control.sock");
    tokio::spawn(ControlSocket::new(delegate, path.clone()).run());

    let mut stream = None;
    for _ in 0..100 {
        if let Ok(connected) = UnixStream::connect(&path).await {
            stream = Some(connected);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let (reader, mut writer) = stream.expect("control socket bound").into_split();
    let mut lines = BufReader::new(reader).lines();

    assert_eq!(ask(&mut lines, &mut writer, r#"{"cmd":"ping"}"#).await, ControlResponse::Pong);

    match ask(&mut lines, &mut writer, r#"{"cmd":"status"}"#).await {
        ControlResponse::Status { node } => {
            assert_eq!(node.connectivity, Connectivity::WaitingForJudges);
            assert_eq!(node.links, 0);
        }
        other => panic!("unexpected {other:?}"),
    }

    let rejected = ask(&mut lines, &mut writer, r#"{"cmd":"set_score","round":1,"corner":"red","value":3}"#).await;
    assert!(matches!(rejected, ControlResponse::Error { .. }));

    match ask(&mut lines, &mut writer, "not json").await {
        ControlResponse::Error { error } => assert!(error.starts_with("Invalid command")),
        other => panic!("unexpected {other:?}"),
    }

    let no_judges = ask(&mut lines, &mut writer, r#"{"cmd":"reset_partial"}"#).await;
    assert!(matches!(no_judges, ControlResponse::Error { .. }));
}

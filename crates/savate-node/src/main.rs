//! Savate node binary
//!
//! Runs a delegate or a judge, depending on `SAVATE_ROLE`.

use savate_node::{ControlSocket, NodeConfig, RunOutcome, ScoringNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "savate_node=info,savate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Savate node");

    loop {
        let config = NodeConfig::from_env()?;
        let (mut node, handle) = ScoringNode::start(&config).await?;
        tracing::info!("Session code {}", node.core().context().session.code);

        let control = tokio::spawn(ControlSocket::new(handle, &config.control_socket).run());

        let outcome = tokio::select! {
            outcome = node.run() => outcome?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                RunOutcome::Stopped
            }
        };
        control.abort();

        match outcome {
            RunOutcome::Reset => {
                tracing::info!("Complete reset, starting a new session");
                continue;
            }
            RunOutcome::SessionEnded | RunOutcome::Stopped => break,
        }
    }

    Ok(())
}

//! Rendezvous binary: peer address registration for delegates and judges.

use savate_node::{RendezvousConfig, RendezvousServer};
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

    let config = RendezvousConfig::from_env()?;
    let server = RendezvousServer::bind(config.listen_addr).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Rendezvous shutting down"),
    }
    Ok(())
}

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use vcmdd::config;
use vcmdd::server::DaemonServer;
use vcmdd::state::DaemonState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    info!("voice command daemon (vcmdd) starting...");

    let config = config::load_config()?;
    let state = Arc::new(DaemonState::new(config)?);

    // First ambient calibration runs before the socket opens so the
    // daemon comes up with a threshold matched to the room.
    {
        let mut listener = state.listener.lock().await;
        let threshold = listener.calibrate().await?;
        info!("Initial calibration done, threshold {:.4}", threshold);
    }

    let server = DaemonServer::new(shared::ipc::socket_path(), state);
    server.run().await?;

    Ok(())
}

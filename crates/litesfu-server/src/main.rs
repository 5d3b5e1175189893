use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use litesfu_server::state::{AppState, Config};
use litesfu_server::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "litesfu_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting litesfu relay...");

    // Load configuration
    let config = Config::load()?;

    // Shared transport API and broadcast track live as long as the process
    let state = AppState::new(config)?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("Unable to listen for shutdown signal: {}", e),
            }
        });
    }

    let result = Supervisor::default()
        .run(|_| litesfu_server::serve(state.clone(), shutdown.clone()))
        .await;

    state.sessions.close_all().await;
    result
}

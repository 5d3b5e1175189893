//! litesfu server library
//!
//! This module exposes the relay components for testing and embedding.

pub mod api;
pub mod error;
pub mod sfu;
pub mod state;
pub mod supervisor;
pub mod transport;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Create the application state and router
pub fn create_app(config: state::Config) -> Result<(axum::Router, state::AppState)> {
    let app_state = state::AppState::new(config)?;
    let router = api::create_router(app_state.clone());
    Ok((router, app_state))
}

/// Bind the configured address and serve until `shutdown` fires
pub async fn serve(state: state::AppState, shutdown: CancellationToken) -> Result<()> {
    let bind_address = state.config.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("Listening on {}", bind_address);

    let app = api::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

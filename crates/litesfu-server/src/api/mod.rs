mod pages;
mod sdp;

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Read/write cap for a single request, signaling included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Signaling
        .route("/sdp", post(sdp::receive_sdp))
        // Browser pages
        .route("/join", get(pages::join))
        .route("/publish", get(pages::publish))
        .nest_service("/static", static_files)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

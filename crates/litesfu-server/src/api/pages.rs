use std::path::Path;

use anyhow::Context;
use axum::{extract::State, response::Html};

use crate::error::Result;
use crate::state::AppState;

pub async fn join(State(state): State<AppState>) -> Result<Html<String>> {
    render(&state.config.template_dir, "join.html").await
}

pub async fn publish(State(state): State<AppState>) -> Result<Html<String>> {
    render(&state.config.template_dir, "publish.html").await
}

async fn render(template_dir: &Path, name: &str) -> Result<Html<String>> {
    let path = template_dir.join(name);
    let page = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read template {}", path.display()))?;
    Ok(Html(page))
}

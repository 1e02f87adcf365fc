use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::link_error;
use crate::api::response::{ApiError, JSend};
use crate::sweeper::{self, SweepStats};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub tokens: usize,
    pub sessions: usize,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tokens: state.store.tokens.len().await,
        sessions: state.store.sessions.len().await,
    })
}

/// Route: POST /api/cleanup
pub async fn cleanup(State(state): State<Arc<AppState>>) -> Result<Json<JSend<SweepStats>>, ApiError> {
    let stats = sweeper::sweep(&state).await.map_err(link_error)?;

    tracing::info!(
        tokens = stats.tokens_removed,
        sessions = stats.sessions_removed,
        "Manual cleanup finished"
    );

    Ok(JSend::success(stats))
}

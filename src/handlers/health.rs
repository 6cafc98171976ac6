use axum::{extract::State, Json};
use std::sync::Arc;
use crate::{models::HealthResponse, AppState};
use tracing::debug;

/// Health check endpoint
pub async fn health_check(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!("{} is running", app_state.config.service_name),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    // The hub is in-memory; answering at all means it is accepting connections.
    let stats = app_state.hub.stats().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!("Serving {} connection(s) across {} room(s)", stats.connections, stats.rooms),
    })
}

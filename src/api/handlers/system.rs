//! System endpoints: health check and gateway statistics.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Merged registry + conversation-presence + heartbeat statistics.
#[derive(Debug, Serialize, ToSchema)]
struct StatsResponse {
    total_connections: usize,
    online_users: usize,
    active_conversations: usize,
    last_sweep_at: Option<String>,
}

/// `GET /stats` — Gateway connection statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Connection statistics",
    description = "Merges connection registry totals, open conversation windows, and heartbeat sweep status.",
    responses(
        (status = 200, description = "Current gateway statistics", body = StatsResponse),
    )
)]
pub async fn stats_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let stats = state.service.connection_stats().await;
    (
        StatusCode::OK,
        Json(StatsResponse {
            total_connections: stats.total_connections,
            online_users: stats.online_users,
            active_conversations: stats.active_conversations,
            last_sweep_at: stats.heartbeat.last_sweep_at.map(|t| t.to_rfc3339()),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}

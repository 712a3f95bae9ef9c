//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the store does not answer
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// "ok" or "unavailable"
    pub database: &'static str,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = (Utc::now() - state.startup_time).num_seconds().max(0) as u64;

    let pool = state.db.pool().await;
    let store_answers = sqlx::query("SELECT 1").execute(&pool).await.is_ok();

    Json(HealthResponse {
        status: if store_answers { "ok" } else { "degraded" },
        module: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        database: if store_answers { "ok" } else { "unavailable" },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

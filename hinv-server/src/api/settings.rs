//! Settings endpoints
//!
//! Only the Discogs token is configurable through the API.

use axum::{extract::State, routing::get, Json, Router};
use hinv_common::db::settings::{get_discogs_token, set_discogs_token};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    /// Empty when no token is configured
    pub discogs_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub discogs_token: String,
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<SettingsResponse>> {
    let pool = state.db.pool().await;
    let token = get_discogs_token(&pool).await?;
    Ok(Json(SettingsResponse {
        discogs_token: token.unwrap_or_default(),
    }))
}

/// PUT /api/settings
///
/// The token is trimmed; an empty value disables Discogs lookups.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<SettingsResponse>> {
    let pool = state.db.pool().await;
    set_discogs_token(&pool, &payload.discogs_token).await?;

    let token = get_discogs_token(&pool).await?;
    info!(configured = token.is_some(), "Discogs token updated");
    Ok(Json(SettingsResponse {
        discogs_token: token.unwrap_or_default(),
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(update_settings))
}

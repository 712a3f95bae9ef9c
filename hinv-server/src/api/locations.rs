//! Storage location endpoints
//!
//! Every logged-in user can list locations; changes are admin-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use hinv_common::db::Location;
use serde::Deserialize;
use tracing::info;

use crate::db::locations::{self, LocationView};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LocationPayload {
    pub name: String,
    pub parent_id: Option<i64>,
}

/// GET /api/locations and GET /api/admin/locations
pub async fn list_locations(State(state): State<AppState>) -> ApiResult<Json<Vec<LocationView>>> {
    let pool = state.db.pool().await;
    Ok(Json(locations::list_with_paths(&pool).await?))
}

/// POST /api/admin/locations
pub async fn create_location(
    State(state): State<AppState>,
    Json(payload): Json<LocationPayload>,
) -> ApiResult<(StatusCode, Json<Location>)> {
    let pool = state.db.pool().await;
    let location = locations::create_location(&pool, &payload.name, payload.parent_id).await?;
    info!(id = location.id, name = %location.name, "Location created");
    Ok((StatusCode::CREATED, Json(location)))
}

/// PUT /api/admin/locations/:id
pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LocationPayload>,
) -> ApiResult<Json<Location>> {
    let pool = state.db.pool().await;
    let location = locations::update_location(&pool, id, &payload.name, payload.parent_id).await?;
    info!(id, name = %location.name, parent_id = ?location.parent_id, "Location updated");
    Ok(Json(location))
}

/// DELETE /api/admin/locations/:id
pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool().await;
    locations::delete_location(&pool, id).await?;
    info!(id, "Location deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Read-only listing for every user
pub fn location_routes() -> Router<AppState> {
    Router::new().route("/api/locations", get(list_locations))
}

pub fn location_admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/locations",
            get(list_locations).post(create_location),
        )
        .route(
            "/api/admin/locations/:id",
            put(update_location).delete(delete_location),
        )
}

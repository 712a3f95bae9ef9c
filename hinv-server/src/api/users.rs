//! User administration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use hinv_common::db::{Role, User};
use serde::Deserialize;
use tracing::info;

use crate::api::auth::CurrentUser;
use crate::db::users;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role_id: i64,
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let pool = state.db.pool().await;
    Ok(Json(users::list_users(&pool).await?))
}

/// POST /api/admin/users
///
/// 409 when the username is taken.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let pool = state.db.pool().await;
    let user = users::create_user(&pool, &payload.username, &payload.password, payload.role_id)
        .await?;
    info!(username = %user.username, role = ?user.role_name, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// DELETE /api/admin/users/:id
///
/// Administrators cannot delete their own account.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if current.id == id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    let pool = state.db.pool().await;
    users::delete_user(&pool, id).await?;
    state.sessions.remove_user(id).await;
    info!(id, by = %current.username, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/roles
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Vec<Role>>> {
    let pool = state.db.pool().await;
    Ok(Json(users::list_roles(&pool).await?))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/:id", delete(delete_user))
        .route("/api/admin/roles", get(list_roles))
}

//! Session authentication
//!
//! `POST /api/login` exchanges credentials for a session token. Protected
//! routes accept the token as `Authorization: Bearer <token>` or in the
//! `hinv_session` cookie. [`require_user`] resolves it to a [`CurrentUser`]
//! request extension; [`require_admin`] additionally checks the role.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use hinv_common::db::init::ADMIN_ROLE;
use hinv_common::db::User;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::db::users;
use crate::sessions::SESSION_COOKIE;
use crate::{ApiError, ApiResult, AppState};

/// Authenticated user, inserted by [`require_user`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Token of the current request's session
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Bearer token, falling back to the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

/// Reject requests without a valid session
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Login required".to_string()))?;
    let user_id = state
        .sessions
        .user_id(&token)
        .await
        .ok_or_else(|| ApiError::Unauthorized("Session expired or unknown".to_string()))?;

    let pool = state.db.pool().await;
    let user = users::get_user(&pool, user_id).await?.ok_or_else(|| {
        ApiError::Unauthorized("Session user no longer exists".to_string())
    })?;

    request.extensions_mut().insert(CurrentUser(user));
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// Reject requests from users without the admin role
///
/// Must run inside [`require_user`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("Login required".to_string()))?;

    if !user.0.has_role(ADMIN_ROLE) {
        warn!(user = %user.0.username, path = %request.uri().path(), "Admin route refused");
        return Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Response> {
    let pool = state.db.pool().await;
    let user = match users::authenticate(&pool, payload.username.trim(), &payload.password).await {
        Ok(user) => user,
        Err(e) => {
            warn!(username = %payload.username, "Login failed");
            return Err(e.into());
        }
    };

    let token = state.sessions.create(user.id).await;
    info!(username = %user.username, "User logged in");

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax",
        SESSION_COOKIE, token
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse { token, user }),
    )
        .into_response())
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Response {
    state.sessions.remove(&token).await;
    let cookie = format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE);
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true })),
    )
        .into_response()
}

/// GET /api/me
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// POST /api/me/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::BadRequest(
            "New passwords do not match".to_string(),
        ));
    }

    let pool = state.db.pool().await;
    users::change_password(&pool, user.id, &payload.current_password, &payload.new_password)
        .await?;
    info!(username = %user.username, "Password changed");

    Ok(Json(json!({ "success": true })))
}

/// Public login route
pub fn login_routes() -> Router<AppState> {
    Router::new().route("/api/login", post(login))
}

/// Routes for the logged-in user's own session and account
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/me/password", post(change_password))
}

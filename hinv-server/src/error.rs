//! Error types for hinv-server
//!
//! Every handler returns [`ApiResult`]; failures render as
//! `{"error": {"code": "...", "message": "..."}}`.

use crate::services::backup::BackupError;
use crate::services::images::ImageError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or unknown session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Logged in without the required role (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (409), e.g. duplicate username or non-empty location
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// hinv-common error
    #[error("Common error: {0}")]
    Common(#[from] hinv_common::Error),

    /// Backup or restore failure
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Image upload failure
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Malformed upload: {}", err))
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        use hinv_common::Error as Common;

        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                Common::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                Common::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                Common::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                Common::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
                Common::Database(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    e.to_string(),
                ),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
            ApiError::Backup(err) => {
                let (status, code) = match &err {
                    BackupError::MissingDatabaseEntry | BackupError::Zip(_) => {
                        (StatusCode::BAD_REQUEST, "INVALID_BACKUP")
                    }
                    BackupError::DatabaseNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    BackupError::UnsupportedStore(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "UNSUPPORTED_STORE")
                    }
                    BackupError::StoreLocked { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "STORE_LOCKED")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "BACKUP_ERROR"),
                };
                (status, code, err.to_string())
            }
            ApiError::Image(err) => match err {
                ImageError::DisallowedType(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
                }
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IMAGE_ERROR",
                    other.to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();
        if status.is_server_error() {
            error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

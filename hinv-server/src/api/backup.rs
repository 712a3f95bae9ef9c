//! Backup download and restore upload
//!
//! Both operations hold the maintenance lock in [`AppState`], so at most one
//! of them runs at a time.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

/// Largest accepted backup upload
pub const MAX_BACKUP_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub message: String,
    pub uploads_restored: usize,
    pub safety_copy: Option<PathBuf>,
}

/// POST /api/admin/backup
///
/// Writes a new archive into the instance directory and returns it as a
/// zip attachment.
pub async fn create_backup(State(state): State<AppState>) -> ApiResult<Response> {
    let _guard = state.maintenance.lock().await;

    let backups = state.backups.clone();
    let archive = tokio::task::spawn_blocking(move || backups.create_backup())
        .await
        .map_err(|e| ApiError::Internal(format!("Backup task failed: {}", e)))??;

    let data = tokio::fs::read(&archive.path).await.map_err(|e| {
        ApiError::Internal(format!("Could not read {}: {}", archive.path.display(), e))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", archive.filename),
            ),
        ],
        data,
    )
        .into_response())
}

/// Save the `backup` field of the form to a temporary file in the instance directory
async fn receive_archive(state: &AppState, multipart: &mut Multipart) -> ApiResult<PathBuf> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("backup") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }
        if !filename.to_ascii_lowercase().ends_with(".zip") {
            return Err(ApiError::BadRequest(
                "Backup must be a .zip file".to_string(),
            ));
        }

        let data = field.bytes().await?;
        let instance_dir = &state.backups.layout().instance_dir;
        tokio::fs::create_dir_all(instance_dir).await.map_err(|e| {
            ApiError::Internal(format!("Could not create {}: {}", instance_dir.display(), e))
        })?;
        let path = instance_dir.join(format!("restore_upload_{}.zip", Uuid::new_v4().simple()));
        tokio::fs::write(&path, &data).await.map_err(|e| {
            ApiError::Internal(format!("Could not store upload: {}", e))
        })?;
        return Ok(path);
    }

    Err(ApiError::BadRequest("Missing 'backup' file field".to_string()))
}

/// POST /api/admin/restore
///
/// Multipart form with one file field named `backup`. The pool is reopened
/// afterwards whether or not the restore succeeded. The restore only counts
/// as successful if the restored file opens; a successful restore ends every
/// session.
pub async fn restore_backup(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<RestoreResponse>> {
    let archive_path = receive_archive(&state, &mut multipart).await?;
    let _guard = state.maintenance.lock().await;

    info!(archive = %archive_path.display(), "Restore requested");
    let result = state.backups.restore_backup(&archive_path, &state.db).await;
    let reopened = state.db.reopen().await;

    if let Err(e) = tokio::fs::remove_file(&archive_path).await {
        warn!(archive = %archive_path.display(), error = %e, "Could not remove uploaded archive");
    }

    if let Err(e) = reopened {
        error!(error = %e, "Could not reopen database after restore");
        let previous = match &result {
            Ok(summary) => match &summary.safety_copy {
                Some(path) => format!("The previous database was saved to {}.", path.display()),
                None => "No copy of the previous database was taken.".to_string(),
            },
            Err(restore_error) => format!("Restore failed first: {}.", restore_error),
        };
        return Err(ApiError::Internal(format!(
            "Database could not be opened after restore ({}). {} Restore a valid backup or put the previous file back and restart the server.",
            e, previous
        )));
    }

    let summary = result?;
    state.sessions.clear().await;

    Ok(Json(RestoreResponse {
        success: summary.database_restored,
        message: "Backup restored. Please log in again.".to_string(),
        uploads_restored: summary.uploads_restored,
        safety_copy: summary.safety_copy,
    }))
}

pub fn backup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/backup", post(create_backup))
        .route(
            "/api/admin/restore",
            post(restore_backup).layer(DefaultBodyLimit::max(MAX_BACKUP_BYTES)),
        )
}

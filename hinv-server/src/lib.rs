//! hinv-server library interface
//!
//! Exposes the application state and router so that integration tests can
//! drive the HTTP surface without binding a socket.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod sessions;

pub use crate::error::{ApiError, ApiResult};

use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::services::backup::BackupManager;
use crate::services::images::ImageStore;
use crate::services::lookup::MetadataResolver;
use crate::sessions::SessionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Embedded store; the pool inside is swapped after a restore
    pub db: Database,
    pub sessions: SessionStore,
    pub resolver: Arc<MetadataResolver>,
    pub backups: Arc<BackupManager>,
    pub images: Arc<ImageStore>,
    /// Held for the duration of a backup or restore
    pub maintenance: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: Database,
        resolver: MetadataResolver,
        backups: BackupManager,
        images: ImageStore,
    ) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            resolver: Arc::new(resolver),
            backups: Arc::new(backups),
            images: Arc::new(images),
            maintenance: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// - public: `/health`, `/api/login`, `/uploads/*`
/// - logged-in users: session, lookup, media and location listing
/// - admins: users, locations, settings, backup and restore
pub fn build_router(state: AppState) -> Router {
    let admin: Router<AppState> = Router::new()
        .merge(api::user_routes())
        .merge(api::location_admin_routes())
        .merge(api::settings_routes())
        .merge(api::backup_routes())
        .route_layer(middleware::from_fn(api::auth::require_admin));

    let protected: Router<AppState> = Router::new()
        .merge(api::session_routes())
        .merge(api::lookup_routes())
        .merge(api::media_routes())
        .merge(api::location_routes())
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_user,
        ));

    Router::new()
        .merge(api::health_routes())
        .merge(api::login_routes())
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(state.images.upload_dir()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

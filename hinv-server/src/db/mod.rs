//! Database access for hinv-server
//!
//! [`Database`] owns the connection pool behind a lock so that a restore can
//! close every connection and swap in a fresh pool afterwards.

pub mod locations;
pub mod media;
pub mod users;

use crate::services::backup::StoreConnections;
use crate::services::lookup::SettingsSource;
use async_trait::async_trait;
use hinv_common::db::init::init_database;
use hinv_common::db::settings::get_setting;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Shared handle to the embedded store
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    pool: Arc<RwLock<SqlitePool>>,
}

impl Database {
    /// Open (or create and seed) the store file
    pub async fn open(path: impl Into<PathBuf>) -> hinv_common::Result<Self> {
        let path = path.into();
        let pool = init_database(&path).await?;
        Ok(Self {
            path,
            pool: Arc::new(RwLock::new(pool)),
        })
    }

    /// Current pool; cheap to clone
    pub async fn pool(&self) -> SqlitePool {
        self.pool.read().await.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the pool with one freshly opened on the store file
    pub async fn reopen(&self) -> hinv_common::Result<()> {
        let fresh = init_database(&self.path).await?;
        let old = std::mem::replace(&mut *self.pool.write().await, fresh);
        old.close().await;
        info!(path = %self.path.display(), "Database pool reopened");
        Ok(())
    }
}

#[async_trait]
impl StoreConnections for Database {
    async fn release(&self) {
        let pool = self.pool().await;
        pool.close().await;
        info!("Database connections closed");
    }
}

#[async_trait]
impl SettingsSource for Database {
    async fn get(&self, key: &str) -> hinv_common::Result<Option<String>> {
        get_setting::<String>(&self.pool().await, key).await
    }
}

//! Backup and restore of the embedded store and the upload directory
//!
//! A backup archive is a deflate zip holding:
//! - `database.sqlite`: a copy of the store file
//! - `uploads/<relative path>`: every file below the upload directory
//!
//! Restore replaces the live store file and extracts uploads by file name
//! into the flat upload directory. Pooled connections must be released
//! before the store file is overwritten; see [`StoreConnections`].

use async_trait::async_trait;
use hinv_common::config::{sqlite_path_from_url, StorageLayout};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Archive entry holding the store file
pub const DATABASE_ENTRY: &str = "database.sqlite";

/// Archive prefix of upload entries
pub const UPLOADS_PREFIX: &str = "uploads/";

/// Staging directory below the instance directory
const STAGING_DIR: &str = "temp_restore";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup only supports SQLite stores (database URL: {0})")]
    UnsupportedStore(String),

    #[error("Database file not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("Invalid backup: archive has no 'database.sqlite' entry")]
    MissingDatabaseEntry,

    #[error(
        "Could not overwrite database file {path}: {source}. \
         Another process may hold a lock on it; restart the server and retry"
    )]
    StoreLocked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Upload directory scan failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Backup task failed: {0}")]
    Task(String),
}

/// Handle to whatever keeps the store file open
#[async_trait]
pub trait StoreConnections: Send + Sync {
    /// Close every pooled connection to the store
    async fn release(&self);
}

/// A freshly written archive
#[derive(Debug, Clone)]
pub struct BackupArchive {
    pub path: PathBuf,
    pub filename: String,
}

/// What a restore changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub database_restored: bool,
    pub uploads_restored: usize,
    /// Copy of the replaced store file, if one could be taken
    pub safety_copy: Option<PathBuf>,
}

/// Creates and restores backup archives
pub struct BackupManager {
    layout: StorageLayout,
    database_url: String,
    lock_release_pause: Duration,
}

impl BackupManager {
    pub fn new(layout: StorageLayout, database_url: impl Into<String>, lock_release_pause: Duration) -> Self {
        Self {
            layout,
            database_url: database_url.into(),
            lock_release_pause,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn configured_store_path(&self) -> Result<PathBuf, BackupError> {
        sqlite_path_from_url(&self.database_url)
            .ok_or_else(|| BackupError::UnsupportedStore(self.database_url.clone()))
    }

    /// Store file to archive
    ///
    /// A relative path is looked up in the instance directory first and the
    /// root directory second. The file must exist.
    pub fn store_source_path(&self) -> Result<PathBuf, BackupError> {
        let configured = self.configured_store_path()?;
        let path = if configured.is_absolute() {
            configured
        } else {
            let in_instance = self.layout.instance_dir.join(&configured);
            if in_instance.exists() {
                in_instance
            } else {
                self.layout.root_dir.join(&configured)
            }
        };

        if !path.exists() {
            return Err(BackupError::DatabaseNotFound(path));
        }
        Ok(path)
    }

    /// Store file a restore writes to
    ///
    /// A relative path goes to the instance directory unless the file is
    /// missing there but present in the root directory.
    pub fn store_destination_path(&self) -> Result<PathBuf, BackupError> {
        let configured = self.configured_store_path()?;
        if configured.is_absolute() {
            return Ok(configured);
        }

        let in_instance = self.layout.instance_dir.join(&configured);
        let in_root = self.layout.root_dir.join(&configured);
        if !in_instance.exists() && in_root.exists() {
            Ok(in_root)
        } else {
            Ok(in_instance)
        }
    }

    /// Write `backup_inventory_<local timestamp>.zip` into the instance directory
    pub fn create_backup(&self) -> Result<BackupArchive, BackupError> {
        let store_path = self.store_source_path()?;
        fs::create_dir_all(&self.layout.instance_dir)?;

        let filename = format!(
            "backup_inventory_{}.zip",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let path = self.layout.instance_dir.join(&filename);
        info!(archive = %path.display(), store = %store_path.display(), "Creating backup");

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(File::create(&path)?);

        writer.start_file(DATABASE_ENTRY, options)?;
        io::copy(&mut File::open(&store_path)?, &mut writer)?;

        let mut uploads = 0usize;
        if self.layout.upload_dir.is_dir() {
            for entry in WalkDir::new(&self.layout.upload_dir).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&self.layout.upload_dir) else {
                    continue;
                };
                let name = archive_upload_name(relative);
                writer.start_file(name.as_str(), options)?;
                io::copy(&mut File::open(entry.path())?, &mut writer)?;
                uploads += 1;
            }
        }

        writer.finish()?;
        info!(archive = %filename, uploads, "Backup created");

        Ok(BackupArchive { path, filename })
    }

    /// Replace the live store and uploads with the archive's content
    ///
    /// Connections are released and a short pause is taken before any file is
    /// touched. Reopening the store afterwards is the caller's job, whether or
    /// not the restore succeeded.
    pub async fn restore_backup(
        &self,
        archive_path: &Path,
        connections: &dyn StoreConnections,
    ) -> Result<RestoreSummary, BackupError> {
        let destination = self.store_destination_path()?;

        connections.release().await;
        debug!(pause_ms = self.lock_release_pause.as_millis() as u64, "Store connections released");
        tokio::time::sleep(self.lock_release_pause).await;

        let layout = self.layout.clone();
        let archive_path = archive_path.to_path_buf();
        tokio::task::spawn_blocking(move || restore_files(&layout, &archive_path, &destination))
            .await
            .map_err(|e| BackupError::Task(e.to_string()))?
    }
}

/// `uploads/` plus the relative path with `/` separators
fn archive_upload_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}{}", UPLOADS_PREFIX, parts.join("/"))
}

fn restore_files(
    layout: &StorageLayout,
    archive_path: &Path,
    destination: &Path,
) -> Result<RestoreSummary, BackupError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    if !archive.file_names().any(|name| name == DATABASE_ENTRY) {
        return Err(BackupError::MissingDatabaseEntry);
    }
    info!(archive = %archive_path.display(), store = %destination.display(), "Restoring backup");

    let staging = layout.instance_dir.join(STAGING_DIR);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let staged_store = staging.join(DATABASE_ENTRY);
    {
        let mut entry = archive.by_name(DATABASE_ENTRY)?;
        io::copy(&mut entry, &mut File::create(&staged_store)?)?;
    }

    let mut safety_copy = None;
    if destination.exists() {
        let mut bak = destination.as_os_str().to_owned();
        bak.push(".bak");
        let bak = PathBuf::from(bak);
        match fs::copy(destination, &bak) {
            Ok(_) => safety_copy = Some(bak),
            Err(e) => warn!(error = %e, "Could not create safety copy of the store file"),
        }
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    // Copy, not rename: open handles elsewhere keep pointing at the live file
    fs::copy(&staged_store, destination).map_err(|source| BackupError::StoreLocked {
        path: destination.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(&layout.upload_dir)?;
    let mut uploads_restored = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if !name.starts_with(UPLOADS_PREFIX) || entry.is_dir() {
            continue;
        }
        let Some(basename) = Path::new(&name).file_name() else {
            continue;
        };
        let target = layout.upload_dir.join(basename);
        io::copy(&mut entry, &mut File::create(&target)?)?;
        uploads_restored += 1;
    }

    fs::remove_dir_all(&staging)?;
    info!(uploads = uploads_restored, "Restore complete");

    Ok(RestoreSummary {
        database_restored: true,
        uploads_restored,
        safety_copy,
    })
}

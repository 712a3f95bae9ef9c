//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `HINV_ROOT_FOLDER`, then `HINV_ROOT` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Missing or malformed TOML files never abort startup: a warning is returned
//! and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the embedded store inside the instance directory
pub const DEFAULT_DATABASE_FILE: &str = "inventory.db";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Primary environment variable for the root folder
pub const ENV_ROOT_FOLDER: &str = "HINV_ROOT_FOLDER";

/// Alternative environment variable for the root folder
pub const ENV_ROOT: &str = "HINV_ROOT";

// ============================================================================
// Compiled defaults
// ============================================================================

/// Values used when neither CLI, environment nor TOML provide one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/hinv (or /var/lib/hinv for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("hinv"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/hinv"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("hinv"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/hinv"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("hinv"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\hinv"))
    } else {
        PathBuf::from("./hinv_data")
    }
}

// ============================================================================
// TOML configuration
// ============================================================================

/// Contents of `config.toml`
///
/// Every field is optional so that partial files stay valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    /// Connection string of the embedded store, e.g. `sqlite:///inventory.db`
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// External catalog endpoints and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_google_books_url")]
    pub google_books_url: String,
    #[serde(default = "default_open_library_url")]
    pub open_library_url: String,
    #[serde(default = "default_discogs_url")]
    pub discogs_url: String,
    /// Per-provider request timeout
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
    /// Timeout for downloading a remote cover image
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            google_books_url: default_google_books_url(),
            open_library_url: default_open_library_url(),
            discogs_url: default_discogs_url(),
            timeout_secs: default_lookup_timeout(),
            image_timeout_secs: default_image_timeout(),
        }
    }
}

fn default_google_books_url() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_open_library_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_discogs_url() -> String {
    "https://api.discogs.com".to_string()
}

fn default_lookup_timeout() -> u64 {
    5
}

fn default_image_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Pause after closing pooled connections before restore touches the store file
    #[serde(default = "default_lock_release_pause")]
    pub lock_release_pause_ms: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            lock_release_pause_ms: default_lock_release_pause(),
        }
    }
}

fn default_lock_release_pause() -> u64 {
    500
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/hinv/config.toml` first, then `/etc/hinv/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("hinv").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/hinv/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Outcome of [`load_toml_config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigLoad {
    pub config: TomlConfig,
    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
    /// Why a config file was ignored; reported by the caller once logging is up
    pub warning: Option<String>,
}

/// Load configuration with graceful degradation
///
/// An explicit path that cannot be read or parsed falls back to defaults
/// with a warning, as does a malformed platform config file. No config file
/// at all is not a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> ConfigLoad {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let Some(path) = path else {
        return ConfigLoad::default();
    };

    match read_toml_config(&path) {
        Ok(config) => ConfigLoad {
            config,
            source: Some(path),
            warning: None,
        },
        Err(e) => ConfigLoad {
            config: TomlConfig::default(),
            source: None,
            warning: Some(format!("Ignoring config file {}: {}", path.display(), e)),
        },
    }
}

// ============================================================================
// Root folder resolution
// ============================================================================

/// Resolves the root folder from CLI, environment, TOML and defaults
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!(module = %self.module_name, var, "Root folder from environment");
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Directory layout below the root folder
///
/// - `instance/` is the primary well-known directory (store file, backups, restore staging)
/// - the root itself is the secondary well-known directory
/// - `static/uploads/` holds uploaded and downloaded images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub root_dir: PathBuf,
    pub instance_dir: PathBuf,
    pub upload_dir: PathBuf,
}

impl StorageLayout {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root_dir = root.into();
        Self {
            instance_dir: root_dir.join("instance"),
            upload_dir: root_dir.join("static").join("uploads"),
            root_dir,
        }
    }

    /// Connection string used when the TOML config names none
    pub fn default_database_url(&self) -> String {
        format!(
            "sqlite:///{}",
            self.instance_dir.join(DEFAULT_DATABASE_FILE).display()
        )
    }
}

/// Creates the root folder tree on first run
pub struct RootFolderInitializer {
    layout: StorageLayout,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            layout: StorageLayout::for_root(root_folder),
        }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        for dir in [
            &self.layout.root_dir,
            &self.layout.instance_dir,
            &self.layout.upload_dir,
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}

// ============================================================================
// Database URL
// ============================================================================

/// Extract the store file path from a connection string
///
/// Returns `None` for anything that is not a SQLite URL. The path is the text
/// after the first `///`; a SQLite URL without `///` falls back to
/// [`DEFAULT_DATABASE_FILE`]. Query parameters are dropped.
pub fn sqlite_path_from_url(url: &str) -> Option<PathBuf> {
    if !url.trim_start().starts_with("sqlite:") {
        return None;
    }

    let raw = match url.split_once("///") {
        Some((_, rest)) => rest,
        None => return Some(PathBuf::from(DEFAULT_DATABASE_FILE)),
    };
    let raw = raw.split('?').next().unwrap_or(raw);
    if raw.is_empty() {
        return Some(PathBuf::from(DEFAULT_DATABASE_FILE));
    }
    Some(PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_url_relative_path() {
        assert_eq!(
            sqlite_path_from_url("sqlite:///inventory.db"),
            Some(PathBuf::from("inventory.db"))
        );
    }

    #[test]
    fn sqlite_url_absolute_path() {
        assert_eq!(
            sqlite_path_from_url("sqlite:////var/lib/hinv/inventory.db"),
            Some(PathBuf::from("/var/lib/hinv/inventory.db"))
        );
    }

    #[test]
    fn sqlite_url_without_slashes_uses_default_file() {
        assert_eq!(
            sqlite_path_from_url("sqlite::memory:"),
            Some(PathBuf::from(DEFAULT_DATABASE_FILE))
        );
    }

    #[test]
    fn sqlite_url_drops_query() {
        assert_eq!(
            sqlite_path_from_url("sqlite:///data/inv.db?mode=rwc"),
            Some(PathBuf::from("data/inv.db"))
        );
    }

    #[test]
    fn non_sqlite_url_rejected() {
        assert_eq!(sqlite_path_from_url("postgres://localhost/inventory"), None);
        assert_eq!(sqlite_path_from_url("mysql:///inventory"), None);
    }

    #[test]
    fn layout_below_root() {
        let layout = StorageLayout::for_root("/srv/hinv");
        assert_eq!(layout.instance_dir, PathBuf::from("/srv/hinv/instance"));
        assert_eq!(layout.upload_dir, PathBuf::from("/srv/hinv/static/uploads"));
        assert_eq!(
            layout.default_database_url(),
            "sqlite:////srv/hinv/instance/inventory.db"
        );
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 8080

            [lookup]
            timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.lookup.timeout_secs, 3);
        assert_eq!(config.lookup.open_library_url, "https://openlibrary.org");
        assert_eq!(config.backup.lock_release_pause_ms, 500);
        assert_eq!(config.logging.level, "info");
    }
}

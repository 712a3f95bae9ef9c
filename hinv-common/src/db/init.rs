//! Database initialization
//!
//! Opens (or creates) the embedded SQLite store, creates the schema with
//! `CREATE TABLE IF NOT EXISTS` and seeds the initial data. Every step is
//! idempotent, so the same function is used at startup and to reopen the
//! store after a restore.

use crate::auth::{generate_salt, hash_password};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Name of the role with administrative rights
pub const ADMIN_ROLE: &str = "Admin";

/// Name of the default role for regular users
pub const USER_ROLE: &str = "User";

/// Username seeded on first start
pub const INITIAL_ADMIN_USERNAME: &str = "admin";

/// Password seeded for [`INITIAL_ADMIN_USERNAME`]
pub const INITIAL_ADMIN_PASSWORD: &str = "admin123";

/// Location every new installation starts with
pub const DEFAULT_LOCATION_NAME: &str = "Unsorted";

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Rollback journal instead of WAL: the backup archive carries the single
    // store file, so committed pages must not linger in a -wal sibling.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Delete)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    create_initial_data(&pool).await?;

    Ok(pool)
}

/// Create every table used by HINV
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_roles_table(pool).await?;
    create_users_table(pool).await?;
    create_locations_table(pool).await?;
    create_media_items_table(pool).await?;
    create_tracks_table(pool).await?;
    create_settings_table(pool).await?;
    Ok(())
}

async fn create_roles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            role_id INTEGER REFERENCES roles(id),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_locations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES locations(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_media_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            inventory_number TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            barcode TEXT,
            author_artist TEXT,
            release_year INTEGER,
            description TEXT,
            image_filename TEXT,
            location_id INTEGER NOT NULL REFERENCES locations(id),
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            lent_to TEXT,
            lent_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_items_location ON media_items(location_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            media_item_id INTEGER NOT NULL REFERENCES media_items(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            duration TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores installation configuration key-value pairs (e.g. `discogs_token`).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed roles, the initial admin account and the default location
///
/// Existing rows are never modified.
pub async fn create_initial_data(pool: &SqlitePool) -> Result<()> {
    for role in [ADMIN_ROLE, USER_ROLE] {
        sqlx::query("INSERT OR IGNORE INTO roles (name) VALUES (?)")
            .bind(role)
            .execute(pool)
            .await?;
    }

    let admin_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
            .bind(INITIAL_ADMIN_USERNAME)
            .fetch_one(pool)
            .await?;

    if !admin_exists {
        let salt = generate_salt();
        let hash = hash_password(INITIAL_ADMIN_PASSWORD, &salt);
        sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, password_salt, role_id)
            VALUES (?, ?, ?, (SELECT id FROM roles WHERE name = ?))
            "#,
        )
        .bind(INITIAL_ADMIN_USERNAME)
        .bind(hash)
        .bind(salt)
        .bind(ADMIN_ROLE)
        .execute(pool)
        .await?;

        info!(
            "Created initial user '{}' (change the password after first login)",
            INITIAL_ADMIN_USERNAME
        );
    }

    let has_location: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM locations)")
        .fetch_one(pool)
        .await?;

    if !has_location {
        sqlx::query("INSERT INTO locations (name) VALUES (?)")
            .bind(DEFAULT_LOCATION_NAME)
            .execute(pool)
            .await?;
        info!("Created default location '{}'", DEFAULT_LOCATION_NAME);
    }

    Ok(())
}

//! Settings database operations
//!
//! Provides get/set accessors for the settings table following the
//! key-value pattern. Values are stored as text and parsed on read.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key holding the Discogs personal access token
pub const DISCOGS_TOKEN_KEY: &str = "discogs_token";

/// Get the Discogs token
///
/// **Returns:** `Some(token)` if set to a non-blank value, `None` otherwise
pub async fn get_discogs_token(db: &Pool<Sqlite>) -> Result<Option<String>> {
    let token = get_setting::<String>(db, DISCOGS_TOKEN_KEY).await?;
    Ok(token.filter(|t| !t.trim().is_empty()))
}

/// Store the Discogs token (trimmed; an empty string clears it)
pub async fn set_discogs_token(db: &Pool<Sqlite>, token: &str) -> Result<()> {
    set_setting(db, DISCOGS_TOKEN_KEY, token.trim()).await
}

/// Generic setting getter
///
/// A missing row and a NULL value both read as `None`.
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

//! Common error types for HINV

use thiserror::Error;

/// Common result type for HINV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared storage and configuration layer
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (root folder, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading, parsing or value error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row lookup by id or key found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied a value the store rejects
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unique constraint or dependent rows prevent the change
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials did not match a stored user
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
}

impl Error {
    /// Map a sqlx unique-constraint failure to [`Error::Conflict`]
    pub fn from_unique_violation(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("{} already exists", what))
            }
            _ => Error::Database(err),
        }
    }
}

//! Database schema, models and the settings store

pub mod init;
pub mod models;
pub mod settings;

pub use init::*;
pub use models::*;

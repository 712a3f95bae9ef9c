//! # HINV Common Library
//!
//! Shared code for the HINV home inventory service:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Database schema, initial data and models
//! - Settings key-value store
//! - Password hashing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};

//! HTTP API handlers for hinv-server
//!
//! Route groups are plain `Router<AppState>` builders; [`crate::build_router`]
//! decides which of them sit behind the session and admin checks.

pub mod auth;
pub mod backup;
pub mod health;
pub mod locations;
pub mod lookup;
pub mod media;
pub mod settings;
pub mod users;

pub use auth::{login_routes, session_routes};
pub use backup::backup_routes;
pub use health::health_routes;
pub use locations::{location_admin_routes, location_routes};
pub use lookup::lookup_routes;
pub use media::media_routes;
pub use settings::settings_routes;
pub use users::user_routes;

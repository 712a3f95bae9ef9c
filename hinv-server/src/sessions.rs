//! In-memory login sessions
//!
//! Tokens are random v4 UUIDs mapped to user ids. Sessions do not survive a
//! restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cookie carrying the session token for browser clients
pub const SESSION_COOKIE: &str = "hinv_session";

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, i64>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its token
    pub async fn create(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(token.clone(), user_id);
        token
    }

    pub async fn user_id(&self, token: &str) -> Option<i64> {
        self.sessions.read().await.get(token).copied()
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// End every session of one user
    pub async fn remove_user(&self, user_id: i64) {
        self.sessions.write().await.retain(|_, id| *id != user_id);
    }

    /// End all sessions
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

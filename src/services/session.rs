// src/services/session.rs
//! In-process session cache
//!
//! Key-value store mapping a user id to a serialized safe user projection
//! with a TTL. This is the revocation mechanism for refresh tokens: a
//! refresh is honored only while the entry exists, so logout is a single
//! `delete` instead of a token blacklist. Entries are overwritten on every
//! login, OAuth login, and refresh.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

struct SessionEntry {
    value: String,
    expires_at: Instant,
}

/// TTL key-value store for user sessions
pub struct SessionCache {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert the session for a user. Overwrites any existing entry.
    pub async fn put(&self, user_id: &str, value: String, ttl_seconds: u64) {
        let entry = SessionEntry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries.write().await.insert(user_id.to_string(), entry);
    }

    /// Fetch the session for a user. An expired entry counts as a miss and
    /// is evicted on the way out.
    pub async fn get(&self, user_id: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                debug!(user_id = %user_id, "Session entry expired, evicting");
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    /// Remove the session for a user. Idempotent.
    pub async fn delete(&self, user_id: &str) {
        self.entries.write().await.remove(user_id);
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

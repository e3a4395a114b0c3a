//! In-process session store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use quotawatch_core::error::CoreResult;
use quotawatch_core::traits::{SessionStore, SESSION_TTL};
use quotawatch_core::types::Session;

use super::generate_token;

/// `HashMap` of token to session behind an async `RwLock`.
///
/// Sessions vanish on process restart. Expired entries are removed lazily on
/// validation and in bulk by [`sweep`](Self::sweep), which the bootstrap layer
/// schedules hourly.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    /// Custom TTL, for tests that need fast expiry.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, user_id: Option<&str>) -> CoreResult<String> {
        let token = generate_token();
        let now = Utc::now();
        let session = Session {
            token: token.clone(),
            user_id: user_id.map(ToString::to_string),
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero()),
        };
        self.sessions.write().await.insert(token.clone(), session);
        Ok(token)
    }

    async fn validate_session(&self, token: &str) -> CoreResult<Option<Session>> {
        if token.is_empty() {
            return Ok(None);
        }

        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(s) if !s.is_expired(now) => return Ok(Some(s.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Found but expired: purge before reporting absence.
        self.sessions.write().await.remove(token);
        Ok(None)
    }

    async fn destroy_session(&self, token: &str) -> CoreResult<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn active_session_count(&self) -> CoreResult<usize> {
        Ok(self.sessions.read().await.len())
    }
}

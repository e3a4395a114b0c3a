//! Redis-backed session store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use quotawatch_core::error::{CoreError, CoreResult};
use quotawatch_core::traits::{SessionStore, SESSION_TTL};
use quotawatch_core::types::Session;

use super::generate_token;

/// Redis key namespace for sessions.
const KEY_PREFIX: &str = "qw:session:";

/// Sessions as JSON values under `qw:session:<token>`, expired natively by
/// Redis via per-key TTL. Survives process restarts and is shared across
/// replicas.
pub struct RedisSessionStore {
    manager: ConnectionManager,
    ttl: Duration,
}

impl RedisSessionStore {
    /// Connect and probe with `PING`.
    ///
    /// # Errors
    /// Returns `CoreError::SessionError` if the server is unreachable; the
    /// bootstrap layer treats that as "fall back to the in-memory store".
    pub async fn connect(url: &str) -> CoreResult<Self> {
        Self::connect_with_ttl(url, SESSION_TTL).await
    }

    /// Custom TTL, for tests that need fast expiry.
    pub async fn connect_with_ttl(url: &str, ttl: Duration) -> CoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CoreError::SessionError(format!("Invalid Redis URL: {e}")))?;
        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CoreError::SessionError(format!("Failed to connect to Redis: {e}")))?;

        redis::cmd("PING")
            .query_async::<String>(&mut manager)
            .await
            .map_err(|e| CoreError::SessionError(format!("Redis probe failed: {e}")))?;

        Ok(Self { manager, ttl })
    }

    fn key(token: &str) -> String {
        format!("{KEY_PREFIX}{token}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
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
        let payload = serde_json::to_string(&session)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;

        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(Self::key(&token))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CoreError::SessionError(format!("Failed to store session: {e}")))?;

        Ok(token)
    }

    async fn validate_session(&self, token: &str) -> CoreResult<Option<Session>> {
        if token.is_empty() {
            return Ok(None);
        }

        let mut conn = self.manager.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(Self::key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| CoreError::SessionError(format!("Failed to read session: {e}")))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let session: Session = match serde_json::from_str(&payload) {
            Ok(s) => s,
            Err(e) => {
                // Unreadable payload: drop the key rather than wedging login.
                log::warn!("Discarding corrupt session payload: {e}");
                self.destroy_session(token).await?;
                return Ok(None);
            }
        };

        // Redis expiry is authoritative, but double-check the stored instant
        // in case the key TTL was tampered with or clocks drifted.
        if session.is_expired(Utc::now()) {
            self.destroy_session(token).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn destroy_session(&self, token: &str) -> CoreResult<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(Self::key(token))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CoreError::SessionError(format!("Failed to delete session: {e}")))?;
        Ok(())
    }

    async fn active_session_count(&self) -> CoreResult<usize> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut count = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(format!("{KEY_PREFIX}*"))
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CoreError::SessionError(format!("Failed to scan sessions: {e}")))?;

            count += keys.len();
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}

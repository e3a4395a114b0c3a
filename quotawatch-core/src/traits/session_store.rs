//! Session store abstraction trait

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CoreResult;
use crate::types::Session;

/// Fixed session time-to-live: 10 days.
pub const SESSION_TTL: Duration = Duration::from_secs(10 * 24 * 60 * 60);

/// Prefix on every minted session token, for recognizability in logs and
/// support tooling.
pub const SESSION_TOKEN_PREFIX: &str = "qw_";

/// Create/validate/destroy opaque bearer tokens with a fixed TTL.
///
/// Implementations:
/// - `MemorySessionStore` — in-process map, swept hourly for expired entries
/// - `RedisSessionStore` — external cache with native per-key expiry
///
/// The two must be behaviorally indistinguishable from the caller's
/// perspective; only persistence across restarts differs. No other component
/// may mint or validate session tokens.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint a new session token.
    async fn create_session(&self, user_id: Option<&str>) -> CoreResult<String>;

    /// Resolve a token to its session.
    ///
    /// Returns `None` for empty or unknown tokens. A session found past its
    /// expiry is destroyed before `None` is returned — there is no implicit
    /// renewal.
    async fn validate_session(&self, token: &str) -> CoreResult<Option<Session>>;

    /// Destroy a session. Idempotent.
    async fn destroy_session(&self, token: &str) -> CoreResult<()>;

    /// Count of currently stored sessions, for status reporting only.
    async fn active_session_count(&self) -> CoreResult<usize>;
}

//! Login session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque bearer session.
///
/// Minted only by a `SessionStore`; `validate_session` never returns a
/// session past `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    /// Owning user, or `None` for the single-admin login mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has passed its expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

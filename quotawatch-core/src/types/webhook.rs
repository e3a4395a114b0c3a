//! Webhook registration and delivery types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of notification event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    QuotaWarning,
    QuotaExceeded,
    ServiceDown,
    ServiceError,
    LoginFailed,
    AccountAdded,
    AccountRemoved,
    /// Synthetic event used only by `test_webhook`.
    Test,
}

impl EventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaWarning => "quota_warning",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceDown => "service_down",
            Self::ServiceError => "service_error",
            Self::LoginFailed => "login_failed",
            Self::AccountAdded => "account_added",
            Self::AccountRemoved => "account_removed",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered webhook target.
///
/// `events` empty means "receive every event type". Registrations never
/// auto-expire; they are mutated only by explicit save/delete calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    /// 16-hex-character identifier.
    pub id: String,
    /// Owning user, or `None` for a global registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub name: String,
    pub url: String,
    /// HMAC-SHA256 key; when set, deliveries carry a signature header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub events: Vec<EventType>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookRegistration {
    /// Whether this registration should receive the given event.
    #[must_use]
    pub fn accepts(&self, event: EventType) -> bool {
        self.enabled && (self.events.is_empty() || self.events.contains(&event))
    }
}

/// Aggregate fan-out outcome, reported to the route layer for display.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryReport {
    pub success: usize,
    pub failed: usize,
}

/// Raw outcome of a single `test_webhook` delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookTestOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(events: Vec<EventType>, enabled: bool) -> WebhookRegistration {
        WebhookRegistration {
            id: "0011223344556677".to_string(),
            user_id: None,
            name: "test".to_string(),
            url: "http://localhost/hook".to_string(),
            secret: None,
            events,
            enabled,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_events_accepts_everything() {
        let reg = registration(vec![], true);
        assert!(reg.accepts(EventType::QuotaWarning));
        assert!(reg.accepts(EventType::LoginFailed));
    }

    #[test]
    fn restricted_events_filter() {
        let reg = registration(vec![EventType::ServiceDown], true);
        assert!(reg.accepts(EventType::ServiceDown));
        assert!(!reg.accepts(EventType::LoginFailed));
    }

    #[test]
    fn disabled_accepts_nothing() {
        let reg = registration(vec![], false);
        assert!(!reg.accepts(EventType::QuotaWarning));
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&EventType::QuotaWarning).unwrap();
        assert_eq!(json, "\"quota_warning\"");
    }
}

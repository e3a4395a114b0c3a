//! Webhook notification dispatcher
//!
//! Holds the registered webhook targets in memory, filters by event type and
//! fans deliveries out concurrently. Delivery is best-effort at-least-once:
//! per-target failures are counted and logged, never retried and never
//! surfaced to the business action that fired the event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::traits::PersistenceBackend;
use crate::types::{DeliveryReport, EventType, WebhookRegistration, WebhookTestOutcome};

type HmacSha256 = Hmac<Sha256>;

/// Per-delivery timeout.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Signature header attached when a registration has a secret.
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// HMAC-SHA256 over the exact serialized payload bytes, hex-encoded.
fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Canonical JSON envelope delivered to every target.
fn build_envelope(event: EventType, data: &serde_json::Value) -> CoreResult<String> {
    let envelope = serde_json::json!({
        "event": event,
        "timestamp": Utc::now().to_rfc3339(),
        "data": data,
    });
    serde_json::to_string(&envelope).map_err(|e| CoreError::SerializationError(e.to_string()))
}

/// Webhook fan-out dispatcher.
///
/// The registration set is process-wide shared state behind a `RwLock`;
/// `reload` rebuilds it from the persistence backend after any registration
/// change.
pub struct NotificationDispatcher {
    backend: Arc<dyn PersistenceBackend>,
    client: reqwest::Client,
    /// Applied per request, so the bound holds even if the client builder
    /// fell back to defaults.
    timeout: Duration,
    registrations: RwLock<Vec<WebhookRegistration>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with an empty registration set.
    ///
    /// Call `reload` before the first event to pick up persisted
    /// registrations.
    #[must_use]
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self::with_timeout(backend, DELIVERY_TIMEOUT)
    }

    /// Custom per-delivery timeout, for tests that need fast failure.
    #[must_use]
    pub fn with_timeout(backend: Arc<dyn PersistenceBackend>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Failed to build webhook HTTP client, using defaults: {e}");
                reqwest::Client::default()
            });
        Self {
            backend,
            client,
            timeout,
            registrations: RwLock::new(Vec::new()),
        }
    }

    /// Rebuild the in-memory registration set from the backend.
    ///
    /// Returns the number of registrations loaded.
    pub async fn reload(&self) -> CoreResult<usize> {
        let webhooks = self.backend.get_all_webhooks().await?;
        let count = webhooks.len();
        *self.registrations.write().await = webhooks;
        log::debug!("Webhook registrations reloaded: {count}");
        Ok(count)
    }

    /// Deliver an event to every matching registration, concurrently.
    ///
    /// Waits for all outcomes (never fail-fast) and returns the aggregate
    /// count. Individual failures are logged here and nowhere else.
    pub async fn send(&self, event: EventType, data: serde_json::Value) -> DeliveryReport {
        let targets: Vec<WebhookRegistration> = {
            let registrations = self.registrations.read().await;
            registrations
                .iter()
                .filter(|r| r.accepts(event))
                .cloned()
                .collect()
        };

        if targets.is_empty() {
            return DeliveryReport::default();
        }

        let payload = match build_envelope(event, &data) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to serialize {event} envelope: {e}");
                return DeliveryReport {
                    success: 0,
                    failed: targets.len(),
                };
            }
        };

        let deliveries = targets
            .iter()
            .map(|target| self.deliver_one(target, &payload));
        let outcomes = join_all(deliveries).await;

        let mut report = DeliveryReport::default();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.success += 1,
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Webhook {} ({}) delivery failed: {e}", target.name, target.id);
                }
            }
        }

        log::info!(
            "Webhook fan-out for {event}: {} delivered, {} failed",
            report.success,
            report.failed
        );
        report
    }

    /// Fire-and-forget variant used from business actions: spawns the
    /// fan-out and discards the outcome beyond a debug log.
    pub fn send_detached(self: &Arc<Self>, event: EventType, data: serde_json::Value) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let report = dispatcher.send(event, data).await;
            log::debug!(
                "Detached {event} fan-out finished: {} ok / {} failed",
                report.success,
                report.failed
            );
        });
    }

    /// Deliver a synthetic `test` event to a single URL and surface the raw
    /// outcome — the one path where delivery failure reaches the caller.
    pub async fn test_webhook(&self, url: &str, secret: Option<&str>) -> WebhookTestOutcome {
        let data = serde_json::json!({ "message": "Test notification" });
        let payload = match build_envelope(EventType::Test, &data) {
            Ok(p) => p,
            Err(e) => {
                return WebhookTestOutcome {
                    success: false,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        };

        match self.post_payload(url, secret, &payload).await {
            Ok(status) => WebhookTestOutcome {
                success: (200..300).contains(&status),
                status: Some(status),
                error: if (200..300).contains(&status) {
                    None
                } else {
                    Some(format!("HTTP {status}"))
                },
            },
            Err(e) => WebhookTestOutcome {
                success: false,
                status: None,
                error: Some(e),
            },
        }
    }

    /// Single delivery attempt: 2xx is success, anything else is a failure.
    async fn deliver_one(&self, target: &WebhookRegistration, payload: &str) -> Result<(), String> {
        let status = self
            .post_payload(&target.url, target.secret.as_deref(), payload)
            .await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(format!("HTTP {status}"))
        }
    }

    /// POST the envelope, attaching the signature header when a secret is set.
    async fn post_payload(
        &self,
        url: &str,
        secret: Option<&str>,
        payload: &str,
    ) -> Result<u16, String> {
        let mut request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .body(payload.to_string());

        if let Some(secret) = secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, payload.as_bytes()));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {:?}", self.timeout)
            } else {
                e.to_string()
            }
        })?;

        Ok(response.status().as_u16())
    }
}

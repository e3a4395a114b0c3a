//! Billing usage history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only usage sample for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub account_name: String,
    pub usage_amount: f64,
    pub recorded_at: DateTime<Utc>,
}

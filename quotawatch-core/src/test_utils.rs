//! Test helper module
//!
//! In-memory `PersistenceBackend` mock used by service-layer unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::traits::PersistenceBackend;
use crate::types::{Account, UsageRecord, User, UserRole, WebhookRegistration};

// ===== MockBackend =====

#[derive(Default)]
pub struct MockBackend {
    accounts: RwLock<Vec<Account>>,
    admin_credential: RwLock<Option<String>>,
    users: RwLock<HashMap<i64, User>>,
    webhooks: RwLock<Vec<WebhookRegistration>>,
    usage: RwLock<Vec<UsageRecord>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw account record as-stored, bypassing the credential
    /// manager (used to simulate corrupted ciphertext).
    pub async fn push_raw_account(&self, account: Account) {
        self.accounts.write().await.push(account);
    }
}

fn scope_matches(record_scope: Option<i64>, scope: Option<i64>) -> bool {
    record_scope == scope
}

#[async_trait]
impl PersistenceBackend for MockBackend {
    async fn load_accounts(&self, scope: Option<i64>) -> CoreResult<Vec<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .filter(|a| scope_matches(a.user_id, scope))
            .cloned()
            .collect())
    }

    async fn save_accounts(&self, scope: Option<i64>, accounts: &[Account]) -> CoreResult<()> {
        let mut store = self.accounts.write().await;
        store.retain(|a| !scope_matches(a.user_id, scope));
        for account in accounts {
            let mut account = account.clone();
            account.user_id = scope;
            store.push(account);
        }
        Ok(())
    }

    async fn load_admin_credential(&self) -> CoreResult<Option<String>> {
        Ok(self.admin_credential.read().await.clone())
    }

    async fn save_admin_credential(&self, value: &str) -> CoreResult<()> {
        *self.admin_credential.write().await = Some(value.to_string());
        Ok(())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> CoreResult<i64> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == username) {
            return Err(CoreError::UserExists(username.to_string()));
        }
        let id = users.keys().max().copied().unwrap_or(0) + 1;
        users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                role,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_user(&self, username: &str) -> CoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_users(&self) -> CoreResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn delete_user(&self, id: i64) -> CoreResult<bool> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            self.accounts.write().await.retain(|a| a.user_id != Some(id));
            self.webhooks
                .write()
                .await
                .retain(|w| w.user_id != Some(id));
        }
        Ok(removed)
    }

    async fn get_webhooks(&self, scope: Option<i64>) -> CoreResult<Vec<WebhookRegistration>> {
        Ok(self
            .webhooks
            .read()
            .await
            .iter()
            .filter(|w| scope_matches(w.user_id, scope))
            .cloned()
            .collect())
    }

    async fn get_all_webhooks(&self) -> CoreResult<Vec<WebhookRegistration>> {
        Ok(self.webhooks.read().await.clone())
    }

    async fn save_webhook(&self, webhook: &WebhookRegistration) -> CoreResult<()> {
        let mut webhooks = self.webhooks.write().await;
        match webhooks.iter_mut().find(|w| w.id == webhook.id) {
            Some(existing) => *existing = webhook.clone(),
            None => webhooks.push(webhook.clone()),
        }
        Ok(())
    }

    async fn delete_webhook(&self, id: &str) -> CoreResult<bool> {
        let mut webhooks = self.webhooks.write().await;
        let before = webhooks.len();
        webhooks.retain(|w| w.id != id);
        Ok(webhooks.len() != before)
    }

    async fn record_usage(&self, account_name: &str, amount: f64) -> CoreResult<()> {
        self.usage.write().await.push(UsageRecord {
            account_name: account_name.to_string(),
            usage_amount: amount,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_usage_history(
        &self,
        account_name: Option<&str>,
        days: u32,
    ) -> CoreResult<Vec<UsageRecord>> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut records: Vec<UsageRecord> = self
            .usage
            .read()
            .await
            .iter()
            .filter(|r| r.recorded_at >= cutoff)
            .filter(|r| account_name.is_none_or(|n| r.account_name == n))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }
}

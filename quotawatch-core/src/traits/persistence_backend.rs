//! Persistence backend abstraction trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Account, UsageRecord, User, UserRole, WebhookRegistration};

/// Uniform CRUD surface over accounts, the admin credential, users, webhook
/// registrations and usage history.
///
/// Implementations:
/// - `FileBackend` — JSON files on local disk, zero external infrastructure
/// - `RelationalBackend` — `SeaORM` over a network database
///
/// Selection between the two is a one-time decision at startup; there is no
/// hot failover afterwards. A `scope` of `None` addresses global (unscoped)
/// records, `Some(user_id)` the records owned by that user.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Load accounts for a scope, in stable insertion order.
    ///
    /// A record whose stored ciphertext cannot be resolved is still returned
    /// (with whatever clear value is available) — a single corrupt record
    /// never fails the batch.
    async fn load_accounts(&self, scope: Option<i64>) -> CoreResult<Vec<Account>>;

    /// Atomically replace the entire account set for a scope.
    ///
    /// Relational mode runs delete-by-scope + bulk insert inside one
    /// transaction and rolls back on failure. File mode rewrites the whole
    /// file (best-effort atomicity, accepted risk).
    async fn save_accounts(&self, scope: Option<i64>, accounts: &[Account]) -> CoreResult<()>;

    /// Load the admin credential (hash, or a legacy clear-text password).
    async fn load_admin_credential(&self) -> CoreResult<Option<String>>;

    /// Store the admin credential. Upsert for the relational case,
    /// whole-file overwrite for the file case.
    async fn save_admin_credential(&self, value: &str) -> CoreResult<()>;

    /// Create a user.
    ///
    /// # Errors
    /// Returns `CoreError::UserExists` when the username is already taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> CoreResult<i64>;

    /// Look up a user by username.
    async fn get_user(&self, username: &str) -> CoreResult<Option<User>>;

    /// List all users.
    async fn get_users(&self) -> CoreResult<Vec<User>>;

    /// Delete a user and cascade to that user's accounts and webhooks.
    ///
    /// Returns `false` if no such user existed.
    async fn delete_user(&self, id: i64) -> CoreResult<bool>;

    /// List webhook registrations for a scope.
    async fn get_webhooks(&self, scope: Option<i64>) -> CoreResult<Vec<WebhookRegistration>>;

    /// List every webhook registration regardless of scope.
    ///
    /// Used by the notification dispatcher to (re)build its in-memory set.
    async fn get_all_webhooks(&self) -> CoreResult<Vec<WebhookRegistration>>;

    /// Upsert a webhook registration by id. Idempotent.
    async fn save_webhook(&self, webhook: &WebhookRegistration) -> CoreResult<()>;

    /// Delete a webhook registration. Returns `false` if it did not exist.
    async fn delete_webhook(&self, id: &str) -> CoreResult<bool>;

    /// Append one usage sample for an account.
    async fn record_usage(&self, account_name: &str, amount: f64) -> CoreResult<()>;

    /// Range-query usage history: last `days` days, optionally filtered by
    /// account name, ascending by record time.
    async fn get_usage_history(
        &self,
        account_name: Option<&str>,
        days: u32,
    ) -> CoreResult<Vec<UsageRecord>>;
}

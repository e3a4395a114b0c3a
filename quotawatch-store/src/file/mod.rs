//! JSON-file persistence backend.
//!
//! One human-readable JSON file per entity type under a data directory,
//! rewritten whole on every save. Atomicity is best-effort: a crash mid-write
//! can corrupt a file (accepted risk for the zero-infrastructure deployment
//! mode). Writes are serialized behind a process-local mutex so two
//! concurrent saves cannot interleave their read-modify-write cycles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use quotawatch_core::error::{CoreError, CoreResult};
use quotawatch_core::traits::PersistenceBackend;
use quotawatch_core::types::{Account, UsageRecord, User, UserRole, WebhookRegistration};

const ACCOUNTS_FILE: &str = "accounts.json";
const PASSWORD_FILE: &str = "password.json";
const USERS_FILE: &str = "users.json";
const WEBHOOKS_FILE: &str = "webhooks.json";
const USAGE_FILE: &str = "usage_history.json";

/// File-mode usage history is physically pruned to this window on every
/// write. The relational backend deliberately does not prune (query-filter
/// only); see DESIGN.md.
const USAGE_RETENTION_DAYS: i64 = 30;

/// Stored shape of the admin credential file.
#[derive(Serialize, serde::Deserialize, Default)]
struct StoredPassword {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// JSON-file persistence backend.
pub struct FileBackend {
    dir: PathBuf,
    /// Serializes read-modify-write cycles across concurrent handlers.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create a file backend rooted at `dir`.
    ///
    /// # Errors
    /// Returns `CoreError::StorageError` if the directory cannot be created —
    /// the one unrecoverable startup failure for file mode.
    pub fn new(dir: &Path) -> CoreResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CoreError::StorageError(format!("Failed to create data directory: {e}")))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Read and parse a JSON file, defaulting when the file is missing or empty.
    async fn read_json<T: DeserializeOwned + Default>(&self, file: &str) -> CoreResult<T> {
        let path = self.path(file);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                return Err(CoreError::StorageError(format!(
                    "Failed to read {file}: {e}"
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::SerializationError(format!("Invalid JSON in {file}: {e}")))
    }

    /// Serialize and rewrite a JSON file whole.
    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;
        tokio::fs::write(self.path(file), json)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to write {file}: {e}")))
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn load_accounts(&self, scope: Option<i64>) -> CoreResult<Vec<Account>> {
        let all: Vec<Account> = self.read_json(ACCOUNTS_FILE).await?;
        Ok(all.into_iter().filter(|a| a.user_id == scope).collect())
    }

    async fn save_accounts(&self, scope: Option<i64>, accounts: &[Account]) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut all: Vec<Account> = self.read_json(ACCOUNTS_FILE).await?;
        all.retain(|a| a.user_id != scope);
        for account in accounts {
            let mut account = account.clone();
            account.user_id = scope;
            all.push(account);
        }
        self.write_json(ACCOUNTS_FILE, &all).await?;

        log::debug!(
            "Saved {} accounts (scope {scope:?}) to {ACCOUNTS_FILE}",
            accounts.len()
        );
        Ok(())
    }

    async fn load_admin_credential(&self) -> CoreResult<Option<String>> {
        let stored: StoredPassword = self.read_json(PASSWORD_FILE).await?;
        Ok(stored.password)
    }

    async fn save_admin_credential(&self, value: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_json(
            PASSWORD_FILE,
            &StoredPassword {
                password: Some(value.to_string()),
            },
        )
        .await
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> CoreResult<i64> {
        let _guard = self.write_lock.lock().await;

        let mut users: Vec<User> = self.read_json(USERS_FILE).await?;
        if users.iter().any(|u| u.username == username) {
            return Err(CoreError::UserExists(username.to_string()));
        }

        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        users.push(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        });
        self.write_json(USERS_FILE, &users).await?;

        log::info!("User created: {username} (id {id})");
        Ok(id)
    }

    async fn get_user(&self, username: &str) -> CoreResult<Option<User>> {
        let users: Vec<User> = self.read_json(USERS_FILE).await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn get_users(&self) -> CoreResult<Vec<User>> {
        self.read_json(USERS_FILE).await
    }

    async fn delete_user(&self, id: i64) -> CoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut users: Vec<User> = self.read_json(USERS_FILE).await?;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Ok(false);
        }
        self.write_json(USERS_FILE, &users).await?;

        // No referential integrity on disk: cascade explicitly.
        let mut accounts: Vec<Account> = self.read_json(ACCOUNTS_FILE).await?;
        accounts.retain(|a| a.user_id != Some(id));
        self.write_json(ACCOUNTS_FILE, &accounts).await?;

        let mut webhooks: Vec<WebhookRegistration> = self.read_json(WEBHOOKS_FILE).await?;
        webhooks.retain(|w| w.user_id != Some(id));
        self.write_json(WEBHOOKS_FILE, &webhooks).await?;

        log::info!("User {id} deleted with owned accounts and webhooks");
        Ok(true)
    }

    async fn get_webhooks(&self, scope: Option<i64>) -> CoreResult<Vec<WebhookRegistration>> {
        let all: Vec<WebhookRegistration> = self.read_json(WEBHOOKS_FILE).await?;
        Ok(all.into_iter().filter(|w| w.user_id == scope).collect())
    }

    async fn get_all_webhooks(&self) -> CoreResult<Vec<WebhookRegistration>> {
        self.read_json(WEBHOOKS_FILE).await
    }

    async fn save_webhook(&self, webhook: &WebhookRegistration) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut webhooks: Vec<WebhookRegistration> = self.read_json(WEBHOOKS_FILE).await?;
        match webhooks.iter_mut().find(|w| w.id == webhook.id) {
            Some(existing) => *existing = webhook.clone(),
            None => webhooks.push(webhook.clone()),
        }
        self.write_json(WEBHOOKS_FILE, &webhooks).await
    }

    async fn delete_webhook(&self, id: &str) -> CoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut webhooks: Vec<WebhookRegistration> = self.read_json(WEBHOOKS_FILE).await?;
        let before = webhooks.len();
        webhooks.retain(|w| w.id != id);
        if webhooks.len() == before {
            return Ok(false);
        }
        self.write_json(WEBHOOKS_FILE, &webhooks).await?;
        Ok(true)
    }

    async fn record_usage(&self, account_name: &str, amount: f64) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut records: Vec<UsageRecord> = self.read_json(USAGE_FILE).await?;
        records.push(UsageRecord {
            account_name: account_name.to_string(),
            usage_amount: amount,
            recorded_at: Utc::now(),
        });

        // Physical retention prune on every write.
        let cutoff = Utc::now() - chrono::Duration::days(USAGE_RETENTION_DAYS);
        records.retain(|r| r.recorded_at >= cutoff);

        self.write_json(USAGE_FILE, &records).await
    }

    async fn get_usage_history(
        &self,
        account_name: Option<&str>,
        days: u32,
    ) -> CoreResult<Vec<UsageRecord>> {
        let records: Vec<UsageRecord> = self.read_json(USAGE_FILE).await?;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut filtered: Vec<UsageRecord> = records
            .into_iter()
            .filter(|r| r.recorded_at >= cutoff)
            .filter(|r| account_name.is_none_or(|n| r.account_name == n))
            .collect();
        filtered.sort_by_key(|r| r.recorded_at);
        Ok(filtered)
    }
}

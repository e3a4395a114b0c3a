//! Relational persistence backend using `SeaORM`.
//!
//! Five tables (users, accounts, config, webhooks, usage_history) plus one
//! composite index on `usage_history(account_name, recorded_at)`. Connection
//! and schema setup happen once at startup; a failure there makes the caller
//! fall back to the file backend for the remainder of the process lifetime.

pub mod entity;
mod migration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, SqlErr,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use quotawatch_core::error::{CoreError, CoreResult};
use quotawatch_core::traits::PersistenceBackend;
use quotawatch_core::types::{
    Account, EncryptedToken, UsageRecord, User, UserRole, WebhookRegistration,
};

use migration::Migrator;

/// Config-table key holding the admin credential.
const ADMIN_CREDENTIAL_KEY: &str = "admin_password";

/// `SeaORM`-backed persistence over Postgres, MySQL or SQLite.
pub struct RelationalBackend {
    db: DatabaseConnection,
}

impl RelationalBackend {
    /// Connect, probe the connection and ensure the schema.
    ///
    /// # Errors
    /// Returns `CoreError::StorageError` if the connection, probe or
    /// migration fails; the caller treats that as "fall back to file mode".
    pub async fn connect(url: &str) -> CoreResult<Self> {
        let db = Database::connect(url)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to connect to database: {e}")))?;

        // Lightweight probe before committing to this backend.
        db.ping()
            .await
            .map_err(|e| CoreError::StorageError(format!("Database probe failed: {e}")))?;

        Migrator::up(&db, None)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to run migrations: {e}")))?;

        Ok(Self { db })
    }

    /// Raw connection handle, for operational tooling and tests.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

// ===== Model conversions =====

impl entity::account::Model {
    fn into_account(self) -> Account {
        let encrypted_token = match (self.ciphertext, self.nonce) {
            (Some(ciphertext), Some(nonce)) => Some(EncryptedToken { ciphertext, nonce }),
            _ => None,
        };
        Account {
            name: self.name,
            token: self.token,
            encrypted_token,
            user_id: self.user_id,
        }
    }
}

fn account_to_active_model(account: &Account, scope: Option<i64>) -> entity::account::ActiveModel {
    let (ciphertext, nonce) = match &account.encrypted_token {
        Some(e) => (Some(e.ciphertext.clone()), Some(e.nonce.clone())),
        None => (None, None),
    };
    entity::account::ActiveModel {
        id: NotSet,
        name: Set(account.name.clone()),
        token: Set(account.token.clone()),
        ciphertext: Set(ciphertext),
        nonce: Set(nonce),
        user_id: Set(scope),
    }
}

impl entity::user::Model {
    fn into_user(self) -> CoreResult<User> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| CoreError::SerializationError(format!("Invalid created_at: {e}")))?
            .with_timezone(&chrono::Utc);
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(CoreError::SerializationError)?;
        Ok(User {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            role,
            created_at,
        })
    }
}

impl entity::webhook::Model {
    fn into_registration(self) -> CoreResult<WebhookRegistration> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| CoreError::SerializationError(format!("Invalid created_at: {e}")))?
            .with_timezone(&chrono::Utc);
        let events = serde_json::from_str(&self.events)
            .map_err(|e| CoreError::SerializationError(format!("Invalid events: {e}")))?;
        Ok(WebhookRegistration {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            url: self.url,
            secret: self.secret,
            events,
            enabled: self.enabled,
            created_at,
        })
    }
}

impl entity::usage_history::Model {
    fn into_record(self) -> CoreResult<UsageRecord> {
        let recorded_at = chrono::DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|e| CoreError::SerializationError(format!("Invalid recorded_at: {e}")))?
            .with_timezone(&chrono::Utc);
        Ok(UsageRecord {
            account_name: self.account_name,
            usage_amount: self.usage_amount,
            recorded_at,
        })
    }
}

#[async_trait]
impl PersistenceBackend for RelationalBackend {
    async fn load_accounts(&self, scope: Option<i64>) -> CoreResult<Vec<Account>> {
        let query = entity::account::Entity::find();
        let query = match scope {
            Some(user_id) => query.filter(entity::account::Column::UserId.eq(user_id)),
            None => query.filter(entity::account::Column::UserId.is_null()),
        };

        let rows = query
            .order_by_asc(entity::account::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query accounts: {e}")))?;

        Ok(rows
            .into_iter()
            .map(entity::account::Model::into_account)
            .collect())
    }

    async fn save_accounts(&self, scope: Option<i64>, accounts: &[Account]) -> CoreResult<()> {
        // Delete-by-scope + bulk insert as one transaction; any failure rolls
        // back and leaves prior state intact.
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to begin transaction: {e}")))?;

        let delete = entity::account::Entity::delete_many();
        let delete = match scope {
            Some(user_id) => delete.filter(entity::account::Column::UserId.eq(user_id)),
            None => delete.filter(entity::account::Column::UserId.is_null()),
        };
        delete
            .exec(&txn)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to clear accounts: {e}")))?;

        if !accounts.is_empty() {
            let models = accounts
                .iter()
                .map(|a| account_to_active_model(a, scope))
                .collect::<Vec<_>>();
            entity::account::Entity::insert_many(models)
                .exec(&txn)
                .await
                .map_err(|e| CoreError::StorageError(format!("Failed to insert accounts: {e}")))?;
        }

        txn.commit()
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to commit accounts: {e}")))?;

        log::debug!("Saved {} accounts (scope {scope:?})", accounts.len());
        Ok(())
    }

    async fn load_admin_credential(&self) -> CoreResult<Option<String>> {
        let row = entity::config::Entity::find_by_id(ADMIN_CREDENTIAL_KEY)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query config: {e}")))?;
        Ok(row.map(|r| r.value))
    }

    async fn save_admin_credential(&self, value: &str) -> CoreResult<()> {
        let active = entity::config::ActiveModel {
            key: Set(ADMIN_CREDENTIAL_KEY.to_string()),
            value: Set(value.to_string()),
        };

        entity::config::Entity::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(entity::config::Column::Key)
                    .update_column(entity::config::Column::Value)
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to save credential: {e}")))?;
        Ok(())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> CoreResult<i64> {
        let active = entity::user::ActiveModel {
            id: NotSet,
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.as_str().to_string()),
            created_at: Set(Utc::now().to_rfc3339()),
        };

        let result = entity::user::Entity::insert(active)
            .exec(&self.db)
            .await
            .map_err(|e| {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    CoreError::UserExists(username.to_string())
                } else {
                    CoreError::StorageError(format!("Failed to create user: {e}"))
                }
            })?;

        log::info!("User created: {username} (id {})", result.last_insert_id);
        Ok(result.last_insert_id)
    }

    async fn get_user(&self, username: &str) -> CoreResult<Option<User>> {
        let row = entity::user::Entity::find()
            .filter(entity::user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query user: {e}")))?;
        row.map(entity::user::Model::into_user).transpose()
    }

    async fn get_users(&self) -> CoreResult<Vec<User>> {
        let rows = entity::user::Entity::find()
            .order_by_asc(entity::user::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query users: {e}")))?;
        rows.into_iter().map(entity::user::Model::into_user).collect()
    }

    async fn delete_user(&self, id: i64) -> CoreResult<bool> {
        // Owned accounts and webhooks go with the user via ON DELETE CASCADE.
        let result = entity::user::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to delete user: {e}")))?;
        Ok(result.rows_affected > 0)
    }

    async fn get_webhooks(&self, scope: Option<i64>) -> CoreResult<Vec<WebhookRegistration>> {
        let query = entity::webhook::Entity::find();
        let query = match scope {
            Some(user_id) => query.filter(entity::webhook::Column::UserId.eq(user_id)),
            None => query.filter(entity::webhook::Column::UserId.is_null()),
        };

        let rows = query
            .all(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query webhooks: {e}")))?;
        rows.into_iter()
            .map(entity::webhook::Model::into_registration)
            .collect()
    }

    async fn get_all_webhooks(&self) -> CoreResult<Vec<WebhookRegistration>> {
        let rows = entity::webhook::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query webhooks: {e}")))?;
        rows.into_iter()
            .map(entity::webhook::Model::into_registration)
            .collect()
    }

    async fn save_webhook(&self, webhook: &WebhookRegistration) -> CoreResult<()> {
        let events = serde_json::to_string(&webhook.events)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;
        let active = entity::webhook::ActiveModel {
            id: Set(webhook.id.clone()),
            user_id: Set(webhook.user_id),
            name: Set(webhook.name.clone()),
            url: Set(webhook.url.clone()),
            secret: Set(webhook.secret.clone()),
            events: Set(events),
            enabled: Set(webhook.enabled),
            created_at: Set(webhook.created_at.to_rfc3339()),
        };

        entity::webhook::Entity::insert(active)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(entity::webhook::Column::Id)
                    .update_columns([
                        entity::webhook::Column::UserId,
                        entity::webhook::Column::Name,
                        entity::webhook::Column::Url,
                        entity::webhook::Column::Secret,
                        entity::webhook::Column::Events,
                        entity::webhook::Column::Enabled,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to save webhook: {e}")))?;
        Ok(())
    }

    async fn delete_webhook(&self, id: &str) -> CoreResult<bool> {
        let result = entity::webhook::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to delete webhook: {e}")))?;
        Ok(result.rows_affected > 0)
    }

    async fn record_usage(&self, account_name: &str, amount: f64) -> CoreResult<()> {
        // Append-only: database mode keeps history and relies on query
        // filtering for retention.
        let active = entity::usage_history::ActiveModel {
            id: NotSet,
            account_name: Set(account_name.to_string()),
            usage_amount: Set(amount),
            recorded_at: Set(Utc::now().to_rfc3339()),
        };
        entity::usage_history::Entity::insert(active)
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to record usage: {e}")))?;
        Ok(())
    }

    async fn get_usage_history(
        &self,
        account_name: Option<&str>,
        days: u32,
    ) -> CoreResult<Vec<UsageRecord>> {
        // RFC 3339 UTC strings compare lexicographically in time order.
        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();

        let query = entity::usage_history::Entity::find()
            .filter(entity::usage_history::Column::RecordedAt.gte(cutoff));
        let query = match account_name {
            Some(name) => query.filter(entity::usage_history::Column::AccountName.eq(name)),
            None => query,
        };

        let rows = query
            .order_by_asc(entity::usage_history::Column::RecordedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to query usage history: {e}")))?;
        rows.into_iter()
            .map(entity::usage_history::Model::into_record)
            .collect()
    }
}

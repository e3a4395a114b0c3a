//! Credential manager
//!
//! Thin façade over `PersistenceBackend` that applies token encryption and
//! admin-password hashing transparently. Callers above this layer only ever
//! see clear tokens; the backend only ever sees what should be persisted.

use std::sync::Arc;

use crate::crypto;
use crate::error::CoreResult;
use crate::traits::PersistenceBackend;
use crate::types::Account;

/// Façade combining `PersistenceBackend` + the token cipher.
///
/// Holds no decrypted state: tokens are decrypted per call and handed to the
/// caller, never cached.
pub struct CredentialManager {
    backend: Arc<dyn PersistenceBackend>,
    /// `None` disables at-rest encryption; tokens are then stored clear.
    encryption_key: Option<[u8; 32]>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(backend: Arc<dyn PersistenceBackend>, encryption_key: Option<[u8; 32]>) -> Self {
        Self {
            backend,
            encryption_key,
        }
    }

    /// Whether token-at-rest encryption is active.
    #[must_use]
    pub fn encryption_enabled(&self) -> bool {
        self.encryption_key.is_some()
    }

    /// Load accounts for a scope, resolving encrypted tokens to clear ones.
    ///
    /// A record whose ciphertext fails to decrypt is returned with its stored
    /// clear token (if any) instead of failing the batch; the failure is
    /// logged.
    pub async fn load_accounts(&self, scope: Option<i64>) -> CoreResult<Vec<Account>> {
        let mut accounts = self.backend.load_accounts(scope).await?;

        for account in &mut accounts {
            let Some(ref encrypted) = account.encrypted_token else {
                continue;
            };
            match self.encryption_key {
                Some(ref key) => match crypto::decrypt_token(encrypted, key) {
                    Ok(token) => {
                        account.token = Some(token);
                        account.encrypted_token = None;
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to decrypt token for account {}: {e}",
                            account.name
                        );
                        account.encrypted_token = None;
                    }
                },
                None => {
                    log::warn!(
                        "Account {} has an encrypted token but no key is configured",
                        account.name
                    );
                    account.encrypted_token = None;
                }
            }
        }

        Ok(accounts)
    }

    /// Replace the account set for a scope, encrypting tokens when a key is
    /// configured.
    ///
    /// A record never persists both a clear and an encrypted token. An
    /// encryption failure for one record is isolated: that record falls back
    /// to its clear token and the batch proceeds.
    pub async fn save_accounts(&self, scope: Option<i64>, accounts: &[Account]) -> CoreResult<()> {
        let mut to_store = accounts.to_vec();

        if let Some(ref key) = self.encryption_key {
            for account in &mut to_store {
                let Some(ref token) = account.token else {
                    continue;
                };
                match crypto::encrypt_token(token, key) {
                    Ok(encrypted) => {
                        account.encrypted_token = Some(encrypted);
                        account.token = None;
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to encrypt token for account {}, storing clear: {e}",
                            account.name
                        );
                    }
                }
            }
        }

        self.backend.save_accounts(scope, &to_store).await
    }

    /// Load the stored admin credential (hash or legacy plaintext).
    pub async fn load_admin_credential(&self) -> CoreResult<Option<String>> {
        self.backend.load_admin_credential().await
    }

    /// Hash and store a new admin password.
    pub async fn save_admin_credential(&self, password: &str) -> CoreResult<()> {
        let hash = crypto::hash_password(password)?;
        self.backend.save_admin_credential(&hash).await
    }

    /// Verify a password attempt against the stored admin credential.
    ///
    /// A legacy clear-text credential that verifies successfully is
    /// immediately re-saved as a hash — once hashed, the stored value never
    /// reverts to clear text.
    pub async fn verify_admin_password(&self, password: &str) -> CoreResult<bool> {
        let Some(stored) = self.backend.load_admin_credential().await? else {
            return Ok(false);
        };

        if !crypto::verify_password(password, &stored) {
            return Ok(false);
        }

        if !crypto::is_hashed(&stored) {
            log::info!("Migrating legacy clear-text admin credential to a hash");
            if let Err(e) = self.save_admin_credential(password).await {
                // Verification already succeeded; the migration retries on
                // the next login.
                log::error!("Failed to migrate admin credential: {e}");
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockBackend;
    use crate::types::EncryptedToken;

    const TEST_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn manager_with_key(backend: Arc<MockBackend>) -> CredentialManager {
        CredentialManager::new(backend, crypto::parse_key(TEST_KEY_HEX))
    }

    // ---- token round-trip ----

    #[tokio::test]
    async fn save_then_load_roundtrips_tokens() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with_key(Arc::clone(&backend));

        let accounts = vec![
            Account::new("prod", "token-prod"),
            Account::new("staging", "token-staging"),
        ];
        manager.save_accounts(None, &accounts).await.unwrap();

        // At rest: ciphertext only, no clear token
        let stored = backend.load_accounts(None).await.unwrap();
        for account in &stored {
            assert!(account.token.is_none());
            assert!(account.encrypted_token.is_some());
        }

        let loaded = manager.load_accounts(None).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "prod");
        assert_eq!(loaded[0].token.as_deref(), Some("token-prod"));
        assert_eq!(loaded[1].token.as_deref(), Some("token-staging"));
        assert!(loaded.iter().all(|a| a.encrypted_token.is_none()));
    }

    #[tokio::test]
    async fn without_key_tokens_stay_clear() {
        let backend = Arc::new(MockBackend::new());
        let manager =
            CredentialManager::new(Arc::clone(&backend) as Arc<dyn PersistenceBackend>, None);

        manager
            .save_accounts(None, &[Account::new("prod", "token-prod")])
            .await
            .unwrap();

        let stored = backend.load_accounts(None).await.unwrap();
        assert_eq!(stored[0].token.as_deref(), Some("token-prod"));
        assert!(stored[0].encrypted_token.is_none());
    }

    // ---- corruption isolation ----

    #[tokio::test]
    async fn corrupt_record_does_not_poison_batch() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with_key(Arc::clone(&backend));

        manager
            .save_accounts(None, &[Account::new("good", "token-good")])
            .await
            .unwrap();

        // Inject a record with garbage ciphertext but a clear fallback token.
        let mut corrupt = Account::new("corrupt", "fallback-token");
        corrupt.encrypted_token = Some(EncryptedToken {
            ciphertext: "AAAA".to_string(),
            nonce: "AAAA".to_string(),
        });
        backend.push_raw_account(corrupt).await;

        let loaded = manager.load_accounts(None).await.unwrap();
        assert_eq!(loaded.len(), 2);
        let good = loaded.iter().find(|a| a.name == "good").unwrap();
        assert_eq!(good.token.as_deref(), Some("token-good"));
        let corrupt = loaded.iter().find(|a| a.name == "corrupt").unwrap();
        assert_eq!(corrupt.token.as_deref(), Some("fallback-token"));
        assert!(corrupt.encrypted_token.is_none());
    }

    // ---- admin credential ----

    #[tokio::test]
    async fn admin_password_is_hashed_on_save() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with_key(Arc::clone(&backend));

        manager.save_admin_credential("hunter2").await.unwrap();

        let stored = backend.load_admin_credential().await.unwrap().unwrap();
        assert!(crypto::is_hashed(&stored));
        assert!(manager.verify_admin_password("hunter2").await.unwrap());
        assert!(!manager.verify_admin_password("wrong").await.unwrap());
    }

    #[tokio::test]
    async fn legacy_plaintext_migrates_to_hash_on_verify() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with_key(Arc::clone(&backend));

        backend.save_admin_credential("abc123").await.unwrap();

        assert!(manager.verify_admin_password("abc123").await.unwrap());

        let stored = backend.load_admin_credential().await.unwrap().unwrap();
        assert!(crypto::is_hashed(&stored));
        assert_ne!(stored, "abc123");
        // Still verifies after migration
        assert!(manager.verify_admin_password("abc123").await.unwrap());
    }

    #[tokio::test]
    async fn verify_with_no_credential_is_false() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager_with_key(backend);
        assert!(!manager.verify_admin_password("anything").await.unwrap());
    }
}

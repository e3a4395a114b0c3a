//! Monitored provider account

use serde::{Deserialize, Serialize};

/// An API token encrypted at rest.
///
/// Both fields are base64. The nonce is generated fresh for every encryption;
/// the AES-GCM tag is carried inside the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedToken {
    pub ciphertext: String,
    pub nonce: String,
}

/// A monitored cloud-provider account.
///
/// `name` is unique within its owning scope. At rest the record carries either
/// `token` (encryption disabled) or `encrypted_token`, never both — the
/// `CredentialManager` enforces that exclusivity on save and resolves it back
/// to a clear `token` on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    /// Clear API token. Present in memory after load; at rest only when
    /// encryption is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Encrypted form of the token, present at rest when encryption is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_token: Option<EncryptedToken>,
    /// Owning user, or `None` for a global (unscoped) account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl Account {
    /// Create an account with a clear token.
    #[must_use]
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: Some(token.into()),
            encrypted_token: None,
            user_id: None,
        }
    }
}

//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Credential handling error (encryption, hashing)
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Duplicate username on create
    #[error("User already exists: {0}")]
    UserExists(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Webhook registration not found
    #[error("Webhook not found: {0}")]
    WebhookNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Network error (webhook delivery, cache access)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Session store error
    #[error("Session error: {0}")]
    SessionError(String),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::UserExists(_)
                | Self::UserNotFound(_)
                | Self::WebhookNotFound(_)
                | Self::ValidationError(_)
        )
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;

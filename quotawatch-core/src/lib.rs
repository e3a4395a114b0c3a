//! QuotaWatch Core Library
//!
//! Credential, session and notification logic for the account-monitoring
//! dashboard, including:
//! - Account token encryption at rest (Credential Manager)
//! - Admin password hashing with silent legacy-plaintext migration
//! - Webhook notification fan-out with HMAC signing
//!
//! Storage is abstracted behind traits so the same logic runs against JSON
//! files, a relational database, an in-process session map or a distributed
//! cache — the backends live in `quotawatch-store` and are chosen once at
//! startup.

pub mod config;
pub mod crypto;
pub mod error;
pub mod services;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use services::{CredentialManager, NotificationDispatcher};
pub use traits::{PersistenceBackend, SessionStore};

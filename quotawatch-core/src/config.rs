//! Environment configuration
//!
//! Everything is optional: with no variables set the system runs in
//! file + in-memory mode with encryption disabled.

use std::path::PathBuf;

use crate::crypto;

/// Default quota-warning threshold (percent).
const DEFAULT_QUOTA_WARNING_THRESHOLD: f64 = 80.0;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enables the relational backend when present and reachable.
    pub database_url: Option<String>,
    /// Enables the distributed session store when present and reachable.
    pub redis_url: Option<String>,
    /// 256-bit token encryption key; `None` disables at-rest encryption.
    pub encryption_key: Option<[u8; 32]>,
    /// Usage percentage above which a `quota_warning` event fires.
    pub quota_warning_threshold: f64,
    /// Directory for the file backend's JSON files.
    pub data_dir: PathBuf,
}

impl Config {
    /// Read configuration from environment variables.
    ///
    /// `TOKEN_ENCRYPTION_KEY` must be exactly 64 hex characters; anything
    /// else is ignored with a warning so a typo disables encryption loudly
    /// instead of corrupting data with a wrong key.
    #[must_use]
    pub fn from_env() -> Self {
        let encryption_key = match std::env::var("TOKEN_ENCRYPTION_KEY") {
            Ok(raw) => match crypto::parse_key(&raw) {
                Some(key) => Some(key),
                None => {
                    log::warn!(
                        "TOKEN_ENCRYPTION_KEY is not a 64-hex-character key; encryption disabled"
                    );
                    None
                }
            },
            Err(_) => None,
        };

        let quota_warning_threshold = std::env::var("QUOTA_WARNING_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_QUOTA_WARNING_THRESHOLD);

        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            encryption_key,
            quota_warning_threshold,
            data_dir: std::env::var("DATA_DIR")
                .map_or_else(|_| PathBuf::from("./data"), PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            encryption_key: None,
            quota_warning_threshold: DEFAULT_QUOTA_WARNING_THRESHOLD,
            data_dir: PathBuf::from("./data"),
        }
    }
}

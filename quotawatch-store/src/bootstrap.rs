//! Startup wiring.
//!
//! Backend selection happens exactly once here. A configured-but-unreachable
//! database or Redis server downgrades to the file / in-memory implementation
//! with a logged warning; nothing later in the process lifetime re-probes or
//! switches back.

use std::sync::Arc;
use std::time::Duration;

use quotawatch_core::config::Config;
use quotawatch_core::error::CoreResult;
use quotawatch_core::services::{CredentialManager, NotificationDispatcher};
use quotawatch_core::traits::{PersistenceBackend, SessionStore};

use crate::file::FileBackend;
use crate::relational::RelationalBackend;
use crate::session::{MemorySessionStore, RedisSessionStore};

/// Interval between expired-session sweeps for the in-memory store.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fully wired application state, shared behind `Arc` by the caller.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn PersistenceBackend>,
    pub sessions: Arc<dyn SessionStore>,
    pub credentials: CredentialManager,
    pub notifier: Arc<NotificationDispatcher>,
}

impl AppState {
    /// Build the full state from configuration.
    ///
    /// # Errors
    /// Fails only if the file backend's data directory cannot be created;
    /// every other degraded condition falls back with a warning.
    pub async fn init(config: Config) -> CoreResult<Self> {
        let backend = init_persistence(&config).await?;
        let sessions = init_session_store(&config).await;

        let credentials = CredentialManager::new(Arc::clone(&backend), config.encryption_key);
        let notifier = Arc::new(NotificationDispatcher::new(Arc::clone(&backend)));
        match notifier.reload().await {
            Ok(loaded) => log::info!("Webhook registrations loaded: {loaded}"),
            // Start with an empty set; the next registration change reloads.
            Err(e) => log::warn!("Failed to load webhook registrations: {e}"),
        }

        Ok(Self {
            config,
            backend,
            sessions,
            credentials,
            notifier,
        })
    }
}

/// Pick the persistence backend: relational when `database_url` is set and
/// the server answers, otherwise the file backend.
pub async fn init_persistence(config: &Config) -> CoreResult<Arc<dyn PersistenceBackend>> {
    if let Some(ref url) = config.database_url {
        match RelationalBackend::connect(url).await {
            Ok(backend) => {
                log::info!("Persistence: database backend");
                return Ok(Arc::new(backend));
            }
            Err(e) => {
                log::warn!("Database unavailable, falling back to file storage: {e}");
            }
        }
    }

    let backend = FileBackend::new(&config.data_dir)?;
    log::info!("Persistence: file backend at {}", config.data_dir.display());
    Ok(Arc::new(backend))
}

/// Pick the session store: Redis when `redis_url` is set and the server
/// answers, otherwise in-memory with an hourly sweeper task.
pub async fn init_session_store(config: &Config) -> Arc<dyn SessionStore> {
    if let Some(ref url) = config.redis_url {
        match RedisSessionStore::connect(url).await {
            Ok(store) => {
                log::info!("Sessions: Redis store");
                return Arc::new(store);
            }
            Err(e) => {
                log::warn!("Redis unavailable, falling back to in-memory sessions: {e}");
            }
        }
    }

    let store = Arc::new(MemorySessionStore::new());
    spawn_session_sweeper(Arc::clone(&store));
    log::info!("Sessions: in-memory store");
    store
}

/// Background task removing expired in-memory sessions every hour.
pub fn spawn_session_sweeper(store: Arc<MemorySessionStore>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        // First tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep().await;
            if removed > 0 {
                log::debug!("Session sweep removed {removed} expired sessions");
            }
        }
    });
}

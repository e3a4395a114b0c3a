//! QuotaWatch storage backends.
//!
//! Concrete implementations of the `quotawatch-core` storage traits:
//! - `FileBackend` — JSON files on local disk, zero external infrastructure
//! - `RelationalBackend` — `SeaORM` over Postgres/MySQL/SQLite
//! - `MemorySessionStore` — in-process session map with an hourly sweep
//! - `RedisSessionStore` — distributed cache with native per-key expiry
//!
//! `bootstrap` holds the one-shot backend selection made at startup: probe
//! the configured database/cache, fall back silently to the local
//! implementations when unreachable, and never re-evaluate at runtime.

mod bootstrap;
mod file;
pub mod relational;
mod session;

pub use bootstrap::{init_persistence, init_session_store, spawn_session_sweeper, AppState};
pub use file::FileBackend;
pub use relational::RelationalBackend;
pub use session::{MemorySessionStore, RedisSessionStore};

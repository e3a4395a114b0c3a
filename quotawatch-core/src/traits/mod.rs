//! Storage abstraction traits

mod persistence_backend;
mod session_store;

pub use persistence_backend::PersistenceBackend;
pub use session_store::{SessionStore, SESSION_TOKEN_PREFIX, SESSION_TTL};

//! Business logic service layer

mod credential_manager;
mod notification;

pub use credential_manager::CredentialManager;
pub use notification::NotificationDispatcher;

//! Domain type definitions

mod account;
mod session;
mod usage;
mod user;
mod webhook;

pub use account::{Account, EncryptedToken};
pub use session::Session;
pub use usage::UsageRecord;
pub use user::{User, UserRole};
pub use webhook::{DeliveryReport, EventType, WebhookRegistration, WebhookTestOutcome};

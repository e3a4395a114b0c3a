//! `SeaORM` entity definitions for the relational backend.

pub mod account;
pub mod config;
pub mod usage_history;
pub mod user;
pub mod webhook;

//! Herald Storage - Persistence layer for the dispatch engine
//!
//! Provides the database models, the store traits consumed by
//! herald-core, PostgreSQL repository implementations, and in-memory
//! stores for embedded hosts and tests.

pub mod db;
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

pub use db::DatabasePool;
pub use models::*;
pub use store::{BindingStore, CampaignStore, DeliveryLog, InstanceStore, MailerSettingsStore};

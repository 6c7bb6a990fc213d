//! Store traits
//!
//! The engine reaches persistence only through these traits. PostgreSQL
//! implementations live in `repository`, in-memory ones in `memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::types::{BindingId, CampaignId, InstanceId};
use herald_common::Result;

use crate::models::{
    Binding, CampaignDefinition, CampaignInstance, CreateBinding, CreateCampaignDefinition,
    CreateCampaignInstance, CreateDeliveryLogEntry, DeliveryLogEntry, InstanceStatus, MailerRecord,
};

/// Event binding persistence. Listing methods return creation order.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn create(&self, input: CreateBinding) -> Result<Binding>;
    async fn get(&self, id: BindingId) -> Result<Option<Binding>>;
    async fn list_all(&self) -> Result<Vec<Binding>>;
    async fn list_by_event(&self, event_key: &str) -> Result<Vec<Binding>>;
    async fn set_enabled(&self, id: BindingId, enabled: bool) -> Result<()>;
    async fn delete(&self, id: BindingId) -> Result<()>;
    async fn delete_by_campaign(&self, campaign_id: CampaignId) -> Result<u64>;
}

/// Campaign definition persistence
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create(&self, input: CreateCampaignDefinition) -> Result<CampaignDefinition>;
    async fn get(&self, id: CampaignId) -> Result<Option<CampaignDefinition>>;
    async fn update(&self, definition: &CampaignDefinition) -> Result<CampaignDefinition>;
    async fn list(&self) -> Result<Vec<CampaignDefinition>>;
    async fn delete(&self, id: CampaignId) -> Result<bool>;
}

/// Campaign instance persistence
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn create(&self, input: CreateCampaignInstance) -> Result<CampaignInstance>;
    async fn get(&self, id: InstanceId) -> Result<Option<CampaignInstance>>;
    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignInstance>>;

    /// Apply an outcome status transition.
    ///
    /// Compare-and-set: the new status is only written when it ranks
    /// above the stored one, and `sent_at` is only set when currently
    /// null. A lost race leaves the row untouched. Returns the stored
    /// instance either way.
    async fn mark_outcome(
        &self,
        id: InstanceId,
        status: InstanceStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<CampaignInstance>;

    /// Clone an instance as a fresh draft with no sent_at and a
    /// numbered subject line unique among the campaign's instances.
    async fn save_as_new(&self, id: InstanceId) -> Result<CampaignInstance>;
}

/// Append-only delivery log
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn append(&self, entry: CreateDeliveryLogEntry) -> Result<DeliveryLogEntry>;
    async fn list_by_instance(&self, instance_id: InstanceId) -> Result<Vec<DeliveryLogEntry>>;
    async fn count_by_instance(&self, instance_id: InstanceId) -> Result<i64>;
}

/// Installed-mailer settings persistence
#[async_trait]
pub trait MailerSettingsStore: Send + Sync {
    /// Create the settings record if missing; re-install is a no-op
    async fn install(&self, name: &str) -> Result<()>;

    /// Remove the settings record, returning whether one existed
    async fn uninstall(&self, name: &str) -> Result<bool>;

    async fn get(&self, name: &str) -> Result<Option<MailerRecord>>;
    async fn is_installed(&self, name: &str) -> Result<bool>;
    async fn update_settings(&self, name: &str, settings: serde_json::Value) -> Result<()>;
    async fn list(&self) -> Result<Vec<MailerRecord>>;
}

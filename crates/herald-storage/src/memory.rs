//! In-memory store implementations
//!
//! Vec-backed stores keeping insertion order, used by embedded hosts
//! that run without PostgreSQL and by the engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::types::{BindingId, CampaignId, InstanceId};
use herald_common::{Error, Result};
use uuid::Uuid;

use crate::models::{
    subject_line_as_new, Binding, CampaignDefinition, CampaignInstance, CreateBinding,
    CreateCampaignDefinition, CreateCampaignInstance, CreateDeliveryLogEntry, DeliveryLogEntry,
    InstanceStatus, MailerRecord,
};
use crate::store::{BindingStore, CampaignStore, DeliveryLog, InstanceStore, MailerSettingsStore};

// ===== MemoryBindingStore =====

#[derive(Clone, Default)]
pub struct MemoryBindingStore {
    bindings: Arc<Mutex<Vec<Binding>>>,
}

impl MemoryBindingStore {
    pub fn new() -> Self {
        Self {
            bindings: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    async fn create(&self, input: CreateBinding) -> Result<Binding> {
        let now = Utc::now();
        let binding = Binding {
            id: Uuid::new_v4(),
            event_key: input.event_key,
            campaign_id: input.campaign_id,
            options: input.options,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        };
        self.bindings.lock().unwrap().push(binding.clone());
        Ok(binding)
    }

    async fn get(&self, id: BindingId) -> Result<Option<Binding>> {
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Binding>> {
        Ok(self.bindings.lock().unwrap().clone())
    }

    async fn list_by_event(&self, event_key: &str) -> Result<Vec<Binding>> {
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.event_key == event_key)
            .cloned()
            .collect())
    }

    async fn set_enabled(&self, id: BindingId, enabled: bool) -> Result<()> {
        let mut bindings = self.bindings.lock().unwrap();
        if let Some(binding) = bindings.iter_mut().find(|b| b.id == id) {
            binding.enabled = enabled;
            binding.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: BindingId) -> Result<()> {
        self.bindings.lock().unwrap().retain(|b| b.id != id);
        Ok(())
    }

    async fn delete_by_campaign(&self, campaign_id: CampaignId) -> Result<u64> {
        let mut bindings = self.bindings.lock().unwrap();
        let before = bindings.len();
        bindings.retain(|b| b.campaign_id != campaign_id);
        Ok((before - bindings.len()) as u64)
    }
}

// ===== MemoryCampaignStore =====

#[derive(Clone, Default)]
pub struct MemoryCampaignStore {
    campaigns: Arc<Mutex<Vec<CampaignDefinition>>>,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CampaignStore for MemoryCampaignStore {
    async fn create(&self, input: CreateCampaignDefinition) -> Result<CampaignDefinition> {
        let now = Utc::now();
        let definition = CampaignDefinition {
            id: Uuid::new_v4(),
            name: input.name,
            mailer_name: input.mailer_name,
            subject_template: input.subject_template,
            from_name: input.from_name,
            from_email: input.from_email,
            reply_to_email: input.reply_to_email,
            cc: input.cc,
            bcc: input.bcc,
            body_template: input.body_template,
            html_body_template: input.html_body_template,
            recipients: input.recipients,
            enable_attachments: input.enable_attachments,
            enabled: input.enabled,
            created_at: now,
            updated_at: now,
        };
        self.campaigns.lock().unwrap().push(definition.clone());
        Ok(definition)
    }

    async fn get(&self, id: CampaignId) -> Result<Option<CampaignDefinition>> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn update(&self, definition: &CampaignDefinition) -> Result<CampaignDefinition> {
        let mut campaigns = self.campaigns.lock().unwrap();
        match campaigns.iter_mut().find(|c| c.id == definition.id) {
            Some(stored) => {
                *stored = definition.clone();
                stored.updated_at = Utc::now();
                Ok(stored.clone())
            }
            None => Err(Error::NotFound(format!("Campaign {}", definition.id))),
        }
    }

    async fn list(&self) -> Result<Vec<CampaignDefinition>> {
        Ok(self.campaigns.lock().unwrap().clone())
    }

    async fn delete(&self, id: CampaignId) -> Result<bool> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let before = campaigns.len();
        campaigns.retain(|c| c.id != id);
        Ok(campaigns.len() < before)
    }
}

// ===== MemoryInstanceStore =====

#[derive(Clone, Default)]
pub struct MemoryInstanceStore {
    instances: Arc<Mutex<Vec<CampaignInstance>>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn create(&self, input: CreateCampaignInstance) -> Result<CampaignInstance> {
        let now = Utc::now();
        let instance = CampaignInstance {
            id: Uuid::new_v4(),
            campaign_id: input.campaign_id,
            subject_line: input.subject_line,
            from_name: input.from_name,
            from_email: input.from_email,
            reply_to: input.reply_to,
            recipients_snapshot: input.recipients_snapshot,
            status: input.status.to_string(),
            error: false,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };
        self.instances.lock().unwrap().push(instance.clone());
        Ok(instance)
    }

    async fn get(&self, id: InstanceId) -> Result<Option<CampaignInstance>> {
        Ok(self
            .instances
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignInstance>> {
        let mut instances: Vec<CampaignInstance> = self
            .instances
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.campaign_id == campaign_id)
            .cloned()
            .collect();
        instances.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(instances)
    }

    async fn mark_outcome(
        &self,
        id: InstanceId,
        status: InstanceStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<CampaignInstance> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("Campaign instance {}", id)))?;

        let current_rank = instance
            .status_enum()
            .map(|s| s.rank())
            .unwrap_or(0);

        if status.rank() > current_rank {
            instance.status = status.to_string();
            instance.error = status == InstanceStatus::Error;
            if instance.sent_at.is_none() {
                instance.sent_at = sent_at;
            }
            instance.updated_at = Utc::now();
        }

        Ok(instance.clone())
    }

    async fn save_as_new(&self, id: InstanceId) -> Result<CampaignInstance> {
        let (original, siblings) = {
            let instances = self.instances.lock().unwrap();
            let original = instances
                .iter()
                .find(|i| i.id == id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Campaign instance {}", id)))?;
            let siblings: Vec<String> = instances
                .iter()
                .filter(|i| i.campaign_id == original.campaign_id)
                .map(|i| i.subject_line.clone())
                .collect();
            (original, siblings)
        };

        self.create(CreateCampaignInstance {
            campaign_id: original.campaign_id,
            subject_line: subject_line_as_new(&original.subject_line, &siblings),
            from_name: original.from_name,
            from_email: original.from_email,
            reply_to: original.reply_to,
            recipients_snapshot: original.recipients_snapshot,
            status: InstanceStatus::Draft,
        })
        .await
    }
}

// ===== MemoryDeliveryLog =====

#[derive(Clone, Default)]
pub struct MemoryDeliveryLog {
    entries: Arc<Mutex<Vec<DeliveryLogEntry>>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    async fn append(&self, entry: CreateDeliveryLogEntry) -> Result<DeliveryLogEntry> {
        let stored = DeliveryLogEntry {
            id: Uuid::new_v4(),
            instance_id: entry.instance_id,
            recipient: entry.recipient,
            outcome: entry.outcome.to_string(),
            error_message: entry.error_message,
            content_snapshot: entry.content_snapshot,
            is_test: entry.is_test,
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list_by_instance(&self, instance_id: InstanceId) -> Result<Vec<DeliveryLogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn count_by_instance(&self, instance_id: InstanceId) -> Result<i64> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.instance_id == instance_id)
            .count() as i64)
    }
}

// ===== MemoryMailerSettingsStore =====

#[derive(Clone, Default)]
pub struct MemoryMailerSettingsStore {
    records: Arc<Mutex<Vec<MailerRecord>>>,
}

impl MemoryMailerSettingsStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl MailerSettingsStore for MemoryMailerSettingsStore {
    async fn install(&self, name: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if !records.iter().any(|r| r.name == name) {
            records.push(MailerRecord {
                name: name.to_string(),
                settings: serde_json::json!({}),
                installed_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn uninstall(&self, name: &str) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.name != name);
        Ok(records.len() < before)
    }

    async fn get(&self, name: &str) -> Result<Option<MailerRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.records.lock().unwrap().iter().any(|r| r.name == name))
    }

    async fn update_settings(&self, name: &str, settings: serde_json::Value) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.name == name) {
            Some(record) => {
                record.settings = settings;
                Ok(())
            }
            None => Err(Error::NotFound(format!("Mailer {} is not installed", name))),
        }
    }

    async fn list(&self) -> Result<Vec<MailerRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_common::types::OptionsBlob;
    use pretty_assertions::assert_eq;

    fn create_test_instance(campaign_id: CampaignId, subject: &str) -> CreateCampaignInstance {
        CreateCampaignInstance {
            campaign_id,
            subject_line: subject.to_string(),
            from_name: None,
            from_email: "noreply@example.com".to_string(),
            reply_to: None,
            recipients_snapshot: vec!["a@example.com".to_string()],
            status: InstanceStatus::Sending,
        }
    }

    #[tokio::test]
    async fn test_bindings_keep_creation_order() {
        let store = MemoryBindingStore::new();
        let campaign_id = Uuid::new_v4();

        for key in ["users.save", "entries.save", "users.save"] {
            store
                .create(CreateBinding {
                    event_key: key.to_string(),
                    campaign_id,
                    options: OptionsBlob::empty(),
                    enabled: true,
                })
                .await
                .unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event_key, "users.save");
        assert_eq!(all[1].event_key, "entries.save");

        let users = store.list_by_event("users.save").await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, all[0].id);
        assert_eq!(users[1].id, all[2].id);
    }

    #[tokio::test]
    async fn test_mark_outcome_never_downgrades() {
        let store = MemoryInstanceStore::new();
        let instance = store
            .create(create_test_instance(Uuid::new_v4(), "Launch"))
            .await
            .unwrap();

        let sent_time = Utc::now();
        let updated = store
            .mark_outcome(instance.id, InstanceStatus::Sent, Some(sent_time))
            .await
            .unwrap();
        assert_eq!(updated.status_enum(), Some(InstanceStatus::Sent));
        assert_eq!(updated.sent_at, Some(sent_time));

        // A late failure report must not claw back the terminal state
        let after = store
            .mark_outcome(instance.id, InstanceStatus::Error, None)
            .await
            .unwrap();
        assert_eq!(after.status_enum(), Some(InstanceStatus::Sent));
        assert_eq!(after.sent_at, Some(sent_time));
        assert!(!after.error);
    }

    #[tokio::test]
    async fn test_mark_outcome_upgrades_in_rank_order() {
        let store = MemoryInstanceStore::new();
        let instance = store
            .create(create_test_instance(Uuid::new_v4(), "Launch"))
            .await
            .unwrap();

        let updated = store
            .mark_outcome(instance.id, InstanceStatus::Error, None)
            .await
            .unwrap();
        assert_eq!(updated.status_enum(), Some(InstanceStatus::Error));
        assert!(updated.error);

        let updated = store
            .mark_outcome(instance.id, InstanceStatus::PartialFailure, Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(updated.status_enum(), Some(InstanceStatus::PartialFailure));
        assert!(!updated.error);
        assert!(updated.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_save_as_new_resets_state_and_numbers_subject() {
        let store = MemoryInstanceStore::new();
        let campaign_id = Uuid::new_v4();
        let instance = store
            .create(create_test_instance(campaign_id, "Launch"))
            .await
            .unwrap();
        store
            .mark_outcome(instance.id, InstanceStatus::Sent, Some(Utc::now()))
            .await
            .unwrap();

        let copy = store.save_as_new(instance.id).await.unwrap();
        assert_eq!(copy.subject_line, "Launch1");
        assert_eq!(copy.status_enum(), Some(InstanceStatus::Draft));
        assert_eq!(copy.sent_at, None);
        assert!(!copy.error);
        assert_eq!(copy.recipients_snapshot, instance.recipients_snapshot);

        let second = store.save_as_new(instance.id).await.unwrap();
        assert_eq!(second.subject_line, "Launch2");
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let store = MemoryMailerSettingsStore::new();

        store.install("defaultmailer").await.unwrap();
        store.install("defaultmailer").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.is_installed("defaultmailer").await.unwrap());

        assert!(store.uninstall("defaultmailer").await.unwrap());
        assert!(!store.uninstall("defaultmailer").await.unwrap());
        assert!(!store.is_installed("defaultmailer").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_settings_requires_install() {
        let store = MemoryMailerSettingsStore::new();
        let err = store
            .update_settings("ghost", serde_json::json!({"host": "smtp.example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        store.install("ghost").await.unwrap();
        store
            .update_settings("ghost", serde_json::json!({"host": "smtp.example.com"}))
            .await
            .unwrap();
        let record = store.get("ghost").await.unwrap().unwrap();
        assert_eq!(record.settings["host"], "smtp.example.com");
    }
}

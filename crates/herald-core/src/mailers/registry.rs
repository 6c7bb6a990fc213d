//! Mailer registry

use std::collections::HashMap;
use std::sync::Arc;

use herald_common::{Error, Result};
use herald_storage::models::MailerRecord;
use herald_storage::store::MailerSettingsStore;
use tracing::{debug, info};

use super::Mailer;

/// Mailer ids that ship with the engine. Their settings records can
/// never be uninstalled.
pub const BUILTIN_MAILERS: &[&str] = &["defaultmailer", "copypaste"];

/// Resolves delivery backends by name and manages their installed
/// settings records.
///
/// Registration is in-process and happens at startup; installation is
/// the persisted marker that a backend is available to campaigns.
pub struct MailerRegistry {
    mailers: HashMap<String, Arc<dyn Mailer>>,
    settings: Arc<dyn MailerSettingsStore>,
}

impl MailerRegistry {
    pub fn new(settings: Arc<dyn MailerSettingsStore>) -> Self {
        Self {
            mailers: HashMap::new(),
            settings,
        }
    }

    /// Register a backend under its id.
    pub fn register(&mut self, mailer: Arc<dyn Mailer>) -> Result<()> {
        let id = mailer.id().to_string();
        if self.mailers.contains_key(&id) {
            return Err(Error::Config(format!("Mailer {} is already registered", id)));
        }
        debug!(mailer = %id, "Registered mailer");
        self.mailers.insert(id, mailer);
        Ok(())
    }

    /// Resolve a backend by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Mailer>> {
        self.mailers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Mailer {}", name)))
    }

    /// Registered backend ids, sorted for stable listings.
    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.mailers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether a settings record exists for the backend.
    pub async fn is_installed(&self, name: &str) -> Result<bool> {
        self.settings.is_installed(name).await
    }

    /// Create the settings record for a registered backend.
    /// Re-installing is a no-op, not an error.
    pub async fn install(&self, name: &str) -> Result<()> {
        self.resolve(name)?;
        self.settings.install(name).await?;
        info!(mailer = %name, "Mailer installed");
        Ok(())
    }

    /// Remove the settings record. Built-in mailers are refused and
    /// their record left untouched; removing an absent record is a
    /// no-op.
    pub async fn uninstall(&self, name: &str) -> Result<()> {
        if BUILTIN_MAILERS.contains(&name) {
            return Err(Error::CannotUninstallBuiltin(name.to_string()));
        }
        if self.settings.uninstall(name).await? {
            info!(mailer = %name, "Mailer uninstalled");
        } else {
            debug!(mailer = %name, "Mailer was not installed");
        }
        Ok(())
    }

    /// Replace the stored settings map for a registered backend.
    pub async fn update_settings(&self, name: &str, settings: serde_json::Value) -> Result<()> {
        self.resolve(name)?;
        self.settings.update_settings(name, settings).await
    }

    /// Stored settings record for a backend, if installed.
    pub async fn settings_for(&self, name: &str) -> Result<Option<MailerRecord>> {
        self.settings.get(name).await
    }

    /// Every installed settings record.
    pub async fn installed_mailers(&self) -> Result<Vec<MailerRecord>> {
        self.settings.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailers::{
        CopyPasteMailer, ExportedEmail, OutboundCampaign, RecipientList, SendReport, SettingField,
    };
    use async_trait::async_trait;
    use herald_common::types::RecipientsSpec;
    use herald_storage::memory::MemoryMailerSettingsStore;
    use herald_storage::models::CampaignInstance;
    use pretty_assertions::assert_eq;

    /// Minimal backend for registry behavior.
    struct EspMailer;

    #[async_trait]
    impl Mailer for EspMailer {
        fn id(&self) -> &str {
            "espmailer"
        }

        fn title(&self) -> &str {
            "External Sending Provider"
        }

        fn define_settings(&self) -> Vec<SettingField> {
            vec![SettingField {
                name: "api_key".to_string(),
                label: "API Key".to_string(),
                required: true,
                secret: true,
            }]
        }

        async fn get_recipient_lists(&self) -> Result<Vec<RecipientList>> {
            Ok(Vec::new())
        }

        async fn prepare_recipient_lists(
            &self,
            _instance: &CampaignInstance,
            _spec: &RecipientsSpec,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn send_campaign(
            &self,
            _message: &OutboundCampaign,
            _recipients: &[String],
        ) -> Result<SendReport> {
            Ok(SendReport::default())
        }

        async fn send_test(
            &self,
            _message: &OutboundCampaign,
            _addresses: &[String],
        ) -> Result<SendReport> {
            Ok(SendReport::default())
        }

        fn export_email(&self, _message: &OutboundCampaign) -> Result<ExportedEmail> {
            Err(Error::NotSupported("espmailer does not export".to_string()))
        }
    }

    fn registry() -> MailerRegistry {
        MailerRegistry::new(Arc::new(MemoryMailerSettingsStore::new()))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = registry();
        registry.register(Arc::new(EspMailer)).unwrap();

        assert_eq!(registry.resolve("espmailer").unwrap().id(), "espmailer");
        assert_eq!(
            registry.resolve("ghost").unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        registry.register(Arc::new(EspMailer)).unwrap();

        let err = registry.register(Arc::new(EspMailer)).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(registry.registered_ids(), vec!["espmailer"]);
    }

    #[tokio::test]
    async fn test_install_requires_registration() {
        let registry = registry();
        let err = registry.install("espmailer").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let mut registry = registry();
        registry.register(Arc::new(EspMailer)).unwrap();

        registry.install("espmailer").await.unwrap();
        registry.install("espmailer").await.unwrap();

        assert!(registry.is_installed("espmailer").await.unwrap());
        assert_eq!(registry.installed_mailers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_builtin_refused_and_record_kept() {
        let mut registry = registry();
        registry.register(Arc::new(CopyPasteMailer)).unwrap();
        registry.install("copypaste").await.unwrap();

        let err = registry.uninstall("copypaste").await.unwrap_err();
        assert_eq!(err.code(), "CANNOT_UNINSTALL_BUILTIN");
        assert!(registry.is_installed("copypaste").await.unwrap());
    }

    #[tokio::test]
    async fn test_uninstall_external_mailer() {
        let mut registry = registry();
        registry.register(Arc::new(EspMailer)).unwrap();
        registry.install("espmailer").await.unwrap();

        registry.uninstall("espmailer").await.unwrap();
        assert!(!registry.is_installed("espmailer").await.unwrap());

        // Absent record stays a no-op.
        registry.uninstall("espmailer").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_and_read_settings() {
        let mut registry = registry();
        registry.register(Arc::new(EspMailer)).unwrap();
        registry.install("espmailer").await.unwrap();

        registry
            .update_settings("espmailer", serde_json::json!({ "api_key": "k-123" }))
            .await
            .unwrap();

        let record = registry.settings_for("espmailer").await.unwrap().unwrap();
        assert_eq!(record.settings["api_key"], "k-123");
    }
}

//! Mailer backends
//!
//! A mailer is a delivery capability, not a data row: backends are
//! registered in code and resolved by name, while their per-install
//! settings live in storage. The engine ships `DefaultMailer` (SMTP)
//! and `CopyPasteMailer` (export only); hosts add their own for
//! external sending services.

pub mod copy_paste;
pub mod default_mailer;
pub mod registry;

pub use copy_paste::CopyPasteMailer;
pub use default_mailer::DefaultMailer;
pub use registry::{MailerRegistry, BUILTIN_MAILERS};

use async_trait::async_trait;
use herald_common::types::RecipientsSpec;
use herald_common::Result;
use herald_storage::models::{CampaignInstance, DeliveryOutcome};
use serde::{Deserialize, Serialize};

/// One editable setting a mailer exposes to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingField {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// Masked when the host displays stored settings.
    #[serde(default)]
    pub secret: bool,
}

/// A named recipient list a mailer owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientList {
    pub handle: String,
    pub label: String,
    pub members: Vec<String>,
}

/// Rendered campaign content handed to a backend for delivery.
#[derive(Debug, Clone)]
pub struct OutboundCampaign {
    pub subject_line: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub body: String,
    pub html_body: Option<String>,
    pub enable_attachments: bool,
}

/// Static representation of a rendered email, for backends whose
/// output is pasted into an external system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEmail {
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Outcome for a single recipient.
#[derive(Debug, Clone)]
pub struct RecipientOutcome {
    pub address: String,
    pub outcome: DeliveryOutcome,
    pub error: Option<String>,
}

impl RecipientOutcome {
    pub fn sent(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            outcome: DeliveryOutcome::Sent,
            error: None,
        }
    }

    pub fn failed(address: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            outcome: DeliveryOutcome::Failed,
            error: Some(error.into()),
        }
    }
}

/// Per-recipient outcomes of one send call.
#[derive(Debug, Clone, Default)]
pub struct SendReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl SendReport {
    pub fn push(&mut self, outcome: RecipientOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == DeliveryOutcome::Sent)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == DeliveryOutcome::Failed)
            .count()
    }

    pub fn any_sent(&self) -> bool {
        self.sent_count() > 0
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.sent_count() == 0
    }
}

/// A delivery backend.
///
/// Send methods report per-recipient outcomes instead of failing the
/// whole call: one bounced address must not cancel its siblings. A
/// top-level `Err` means the backend could not attempt delivery at
/// all (bad settings, unreachable service).
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Stable unique id, e.g. `defaultmailer`.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn title(&self) -> &str;

    /// Settings schema the host renders for operators.
    fn define_settings(&self) -> Vec<SettingField>;

    /// Named recipient lists this backend owns.
    /// `Error::NotSupported` when the backend has no list concept.
    async fn get_recipient_lists(&self) -> Result<Vec<RecipientList>>;

    /// Names of the lists an instance targets, recorded when the
    /// instance is frozen.
    async fn prepare_recipient_lists(
        &self,
        instance: &CampaignInstance,
        spec: &RecipientsSpec,
    ) -> Result<Vec<String>>;

    /// Deliver to every recipient.
    async fn send_campaign(
        &self,
        message: &OutboundCampaign,
        recipients: &[String],
    ) -> Result<SendReport>;

    /// Deliver a test message to explicit addresses. Implementations
    /// never touch instance state; the caller handles test logging.
    async fn send_test(
        &self,
        message: &OutboundCampaign,
        addresses: &[String],
    ) -> Result<SendReport>;

    /// Export the rendered message.
    /// `Error::NotSupported` when the backend cannot export.
    fn export_email(&self, message: &OutboundCampaign) -> Result<ExportedEmail>;
}

impl std::fmt::Debug for dyn Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer").field("id", &self.id()).finish()
    }
}

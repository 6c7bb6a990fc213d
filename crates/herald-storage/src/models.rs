//! Database models

use chrono::{DateTime, Utc};
use herald_common::types::{
    BindingId, CampaignId, DeliveryLogId, InstanceId, OptionsBlob, RecipientsSpec,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Event binding model
///
/// Associates a registered event key with a campaign definition, along
/// with the descriptor-specific match options captured at save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub id: BindingId,
    pub event_key: String,
    pub campaign_id: CampaignId,
    pub options: OptionsBlob,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create binding input
#[derive(Debug, Clone)]
pub struct CreateBinding {
    pub event_key: String,
    pub campaign_id: CampaignId,
    pub options: OptionsBlob,
    pub enabled: bool,
}

/// Campaign definition status, derived from the stored fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Disabled,
    Incomplete,
    Ready,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Disabled => write!(f, "disabled"),
            CampaignStatus::Incomplete => write!(f, "incomplete"),
            CampaignStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Campaign definition model
///
/// The reusable template for one kind of outgoing campaign. Instances
/// snapshot these fields at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignDefinition {
    pub id: CampaignId,
    pub name: String,
    pub mailer_name: String,
    pub subject_template: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to_email: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub body_template: String,
    pub html_body_template: Option<String>,
    pub recipients: RecipientsSpec,
    pub enable_attachments: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignDefinition {
    /// Derive the definition status
    ///
    /// Never stored: a definition is Disabled when switched off,
    /// Incomplete while any field required for delivery is missing,
    /// and Ready otherwise. Only Ready definitions are dispatched.
    pub fn status(&self) -> CampaignStatus {
        if !self.enabled {
            return CampaignStatus::Disabled;
        }
        if self.mailer_name.is_empty()
            || self.subject_template.is_empty()
            || self.body_template.is_empty()
            || self.from_email.is_empty()
        {
            return CampaignStatus::Incomplete;
        }
        CampaignStatus::Ready
    }
}

/// Create campaign definition input
#[derive(Debug, Clone)]
pub struct CreateCampaignDefinition {
    pub name: String,
    pub mailer_name: String,
    pub subject_template: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to_email: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub body_template: String,
    pub html_body_template: Option<String>,
    pub recipients: RecipientsSpec,
    pub enable_attachments: bool,
    pub enabled: bool,
}

/// Campaign instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Draft,
    Scheduled,
    Sending,
    Error,
    PartialFailure,
    Sent,
}

impl InstanceStatus {
    /// Ordering used by the outcome compare-and-set. Transitions only
    /// ever move to a higher rank, so Sent is terminal and a delivered
    /// instance is never downgraded by a late failure report.
    pub fn rank(&self) -> u8 {
        match self {
            InstanceStatus::Draft => 0,
            InstanceStatus::Scheduled => 1,
            InstanceStatus::Sending => 2,
            InstanceStatus::Error => 3,
            InstanceStatus::PartialFailure => 4,
            InstanceStatus::Sent => 5,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Draft => write!(f, "draft"),
            InstanceStatus::Scheduled => write!(f, "scheduled"),
            InstanceStatus::Sending => write!(f, "sending"),
            InstanceStatus::Error => write!(f, "error"),
            InstanceStatus::PartialFailure => write!(f, "partial_failure"),
            InstanceStatus::Sent => write!(f, "sent"),
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InstanceStatus::Draft),
            "scheduled" => Ok(InstanceStatus::Scheduled),
            "sending" => Ok(InstanceStatus::Sending),
            "error" => Ok(InstanceStatus::Error),
            "partial_failure" => Ok(InstanceStatus::PartialFailure),
            "sent" => Ok(InstanceStatus::Sent),
            _ => Err(format!("Invalid instance status: {}", s)),
        }
    }
}

/// Campaign instance model
///
/// One concrete send of a campaign definition with rendered content
/// and the recipient set frozen at dispatch time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignInstance {
    pub id: InstanceId,
    pub campaign_id: CampaignId,
    pub subject_line: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub recipients_snapshot: Vec<String>,
    pub status: String,
    pub error: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignInstance {
    /// Get status enum
    pub fn status_enum(&self) -> Option<InstanceStatus> {
        self.status.parse().ok()
    }
}

/// Pick a subject line for a copied instance.
///
/// Keeps the original subject unless it collides with a sibling, then
/// appends an incrementing counter until the value is free.
pub fn subject_line_as_new(base: &str, existing: &[String]) -> String {
    if !existing.iter().any(|s| s == base) {
        return base.to_string();
    }

    let mut i = 1;
    loop {
        let candidate = format!("{}{}", base, i);
        if !existing.iter().any(|s| s == &candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// Create campaign instance input
#[derive(Debug, Clone)]
pub struct CreateCampaignInstance {
    pub campaign_id: CampaignId,
    pub subject_line: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub reply_to: Option<String>,
    pub recipients_snapshot: Vec<String>,
    pub status: InstanceStatus,
}

/// Delivery outcome for a single recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Sent => write!(f, "sent"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryOutcome::Sent),
            "failed" => Ok(DeliveryOutcome::Failed),
            _ => Err(format!("Invalid delivery outcome: {}", s)),
        }
    }
}

/// Delivery log entry model
///
/// Append-only record of one delivery attempt to one recipient.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: DeliveryLogId,
    pub instance_id: InstanceId,
    pub recipient: String,
    pub outcome: String,
    pub error_message: Option<String>,
    pub content_snapshot: serde_json::Value,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    /// Get outcome enum
    pub fn outcome_enum(&self) -> Option<DeliveryOutcome> {
        self.outcome.parse().ok()
    }
}

/// Create delivery log entry input
#[derive(Debug, Clone)]
pub struct CreateDeliveryLogEntry {
    pub instance_id: InstanceId,
    pub recipient: String,
    pub outcome: DeliveryOutcome,
    pub error_message: Option<String>,
    pub content_snapshot: serde_json::Value,
    pub is_test: bool,
}

/// Installed mailer record
///
/// Presence of a row marks the mailer as installed; `settings` holds
/// the operator-edited values for the fields the mailer defines.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MailerRecord {
    pub name: String,
    pub settings: serde_json::Value,
    pub installed_at: DateTime<Utc>,
}

//! Default mailer - direct SMTP delivery through the configured relay

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use herald_common::config::SmtpConfig;
use herald_common::types::RecipientsSpec;
use herald_common::{Error, Result};
use herald_storage::models::CampaignInstance;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{
    ExportedEmail, Mailer, OutboundCampaign, RecipientList, RecipientOutcome, SendReport,
    SettingField,
};

/// Sends one message per recipient over SMTP.
///
/// Recipients fan out under a bounded worker pool; each address gets
/// its own outcome, so a rejected mailbox never cancels the rest of
/// the batch.
pub struct DefaultMailer {
    config: SmtpConfig,
    recipient_lists: Vec<RecipientList>,
    concurrency: usize,
}

impl DefaultMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            recipient_lists: Vec::new(),
            concurrency: 8,
        }
    }

    /// Host-defined named lists this backend exposes.
    pub fn with_recipient_lists(mut self, lists: Vec<RecipientList>) -> Self {
        self.recipient_lists = lists;
        self
    }

    /// Bound on concurrent per-recipient sends.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    fn sender_mailbox(&self, message: &OutboundCampaign) -> Result<Mailbox> {
        let from_email = if message.from_email.is_empty() {
            &self.config.from_address
        } else {
            &message.from_email
        };
        let from_name = message
            .from_name
            .clone()
            .or_else(|| self.config.from_name.clone());

        let formatted = match from_name {
            Some(name) => format!("{} <{}>", name, from_email),
            None => from_email.clone(),
        };
        formatted
            .parse()
            .map_err(|e| Error::Validation(format!("Invalid from address {}: {}", from_email, e)))
    }

    /// Build the lettre message for one recipient.
    fn build_message(&self, message: &OutboundCampaign, recipient: &str) -> Result<Message> {
        let from = self.sender_mailbox(message)?;
        let to: Mailbox = recipient.parse().map_err(|e| {
            Error::Validation(format!("Invalid recipient address {}: {}", recipient, e))
        })?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject_line.clone());

        if let Some(reply_to) = &message.reply_to {
            let mailbox: Mailbox = reply_to.parse().map_err(|e| {
                Error::Validation(format!("Invalid reply-to address {}: {}", reply_to, e))
            })?;
            builder = builder.reply_to(mailbox);
        }
        for cc in &message.cc {
            let mailbox: Mailbox = cc
                .parse()
                .map_err(|e| Error::Validation(format!("Invalid cc address {}: {}", cc, e)))?;
            builder = builder.cc(mailbox);
        }
        for bcc in &message.bcc {
            let mailbox: Mailbox = bcc
                .parse()
                .map_err(|e| Error::Validation(format!("Invalid bcc address {}: {}", bcc, e)))?;
            builder = builder.bcc(mailbox);
        }

        let email = match &message.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(SinglePart::html(html.clone())),
            ),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body.clone()),
        };

        email.map_err(|e| Error::Delivery(format!("Failed to build email: {}", e)))
    }

    /// Build the async SMTP transport per the relay configuration.
    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| Error::Delivery(format!("Failed to create SMTP transport: {}", e)))?
        } else if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| Error::Delivery(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        let mut builder = builder.port(self.config.port);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder
            .timeout(Some(StdDuration::from_secs(self.config.timeout_secs)))
            .build())
    }

    async fn fan_out(
        &self,
        message: &OutboundCampaign,
        recipients: &[String],
    ) -> Result<SendReport> {
        let transport = Arc::new(self.build_transport()?);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut report = SendReport::default();
        let mut handles = Vec::new();

        for recipient in recipients {
            let email = match self.build_message(message, recipient) {
                Ok(email) => email,
                Err(e) => {
                    warn!(recipient = %recipient, error = %e, "Failed to build email");
                    report.push(RecipientOutcome::failed(recipient.clone(), e.to_string()));
                    continue;
                }
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("Send pool closed: {}", e)))?;
            let transport = transport.clone();
            let recipient = recipient.clone();

            handles.push(tokio::spawn(async move {
                let outcome = match transport.send(email).await {
                    Ok(response) => {
                        debug!(recipient = %recipient, response = ?response, "Email accepted by relay");
                        RecipientOutcome::sent(recipient)
                    }
                    Err(e) => RecipientOutcome::failed(recipient, e.to_string()),
                };
                drop(permit);
                outcome
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(outcome) => report.push(outcome),
                Err(e) => warn!(error = %e, "Send task failed to complete"),
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl Mailer for DefaultMailer {
    fn id(&self) -> &str {
        "defaultmailer"
    }

    fn title(&self) -> &str {
        "Default Mailer"
    }

    fn define_settings(&self) -> Vec<SettingField> {
        vec![
            SettingField {
                name: "host".to_string(),
                label: "SMTP Host".to_string(),
                required: true,
                secret: false,
            },
            SettingField {
                name: "port".to_string(),
                label: "SMTP Port".to_string(),
                required: true,
                secret: false,
            },
            SettingField {
                name: "username".to_string(),
                label: "Username".to_string(),
                required: false,
                secret: false,
            },
            SettingField {
                name: "password".to_string(),
                label: "Password".to_string(),
                required: false,
                secret: true,
            },
            SettingField {
                name: "from_address".to_string(),
                label: "Default From Address".to_string(),
                required: true,
                secret: false,
            },
        ]
    }

    async fn get_recipient_lists(&self) -> Result<Vec<RecipientList>> {
        Ok(self.recipient_lists.clone())
    }

    async fn prepare_recipient_lists(
        &self,
        _instance: &CampaignInstance,
        spec: &RecipientsSpec,
    ) -> Result<Vec<String>> {
        Ok(spec
            .lists
            .iter()
            .filter(|name| self.recipient_lists.iter().any(|l| l.handle == **name))
            .cloned()
            .collect())
    }

    async fn send_campaign(
        &self,
        message: &OutboundCampaign,
        recipients: &[String],
    ) -> Result<SendReport> {
        self.fan_out(message, recipients).await
    }

    async fn send_test(
        &self,
        message: &OutboundCampaign,
        addresses: &[String],
    ) -> Result<SendReport> {
        self.fan_out(message, addresses).await
    }

    fn export_email(&self, _message: &OutboundCampaign) -> Result<ExportedEmail> {
        Err(Error::NotSupported(
            "defaultmailer delivers directly and does not export".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_storage::models::InstanceStatus;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig::default()
    }

    fn instance() -> CampaignInstance {
        CampaignInstance {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            subject_line: "Release 1.2".to_string(),
            from_name: None,
            from_email: "news@example.com".to_string(),
            reply_to: None,
            recipients_snapshot: Vec::new(),
            status: InstanceStatus::Draft.to_string(),
            error: false,
            sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn outbound() -> OutboundCampaign {
        OutboundCampaign {
            subject_line: "Release 1.2".to_string(),
            from_name: Some("Release Desk".to_string()),
            from_email: "news@example.com".to_string(),
            reply_to: Some("replies@example.com".to_string()),
            cc: Vec::new(),
            bcc: Vec::new(),
            body: "Plain text body".to_string(),
            html_body: Some("<p>HTML body</p>".to_string()),
            enable_attachments: false,
        }
    }

    #[test]
    fn test_build_message_multipart() {
        let mailer = DefaultMailer::new(smtp_config());
        let email = mailer.build_message(&outbound(), "reader@example.com").unwrap();

        let raw = String::from_utf8_lossy(&email.formatted()).to_string();
        assert!(raw.contains("Subject: Release 1.2"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Plain text body"));
        assert!(raw.contains("<p>HTML body</p>"));
    }

    #[test]
    fn test_build_message_text_only() {
        let mailer = DefaultMailer::new(smtp_config());
        let mut message = outbound();
        message.html_body = None;

        let email = mailer.build_message(&message, "reader@example.com").unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).to_string();
        assert!(raw.contains("Plain text body"));
        assert!(!raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_cc_and_bcc_reach_the_envelope() {
        let mailer = DefaultMailer::new(smtp_config());
        let mut message = outbound();
        message.cc = vec!["cc@example.com".to_string()];
        message.bcc = vec!["bcc@example.com".to_string()];

        let email = mailer.build_message(&message, "reader@example.com").unwrap();
        assert_eq!(email.envelope().to().len(), 3);
    }

    #[test]
    fn test_sender_falls_back_to_configured_address() {
        let mailer = DefaultMailer::new(smtp_config());
        let mut message = outbound();
        message.from_email = String::new();
        message.from_name = None;

        let email = mailer.build_message(&message, "reader@example.com").unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).to_string();
        // SmtpConfig's default from address
        assert!(raw.contains("noreply@localhost"));
    }

    #[test]
    fn test_invalid_recipient_rejected_at_build() {
        let mailer = DefaultMailer::new(smtp_config());
        let err = mailer
            .build_message(&outbound(), "not an address")
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_prepare_recipient_lists_filters_to_known_handles() {
        let mailer = DefaultMailer::new(smtp_config()).with_recipient_lists(vec![RecipientList {
            handle: "staff".to_string(),
            label: "Staff".to_string(),
            members: vec!["lead@example.com".to_string()],
        }]);

        let spec = RecipientsSpec {
            addresses: Vec::new(),
            lists: vec!["staff".to_string(), "unknown".to_string()],
        };

        let prepared = mailer
            .prepare_recipient_lists(&instance(), &spec)
            .await
            .unwrap();
        assert_eq!(prepared, vec!["staff"]);
    }
}

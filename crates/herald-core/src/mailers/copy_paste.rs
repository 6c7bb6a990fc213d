//! Copy/paste mailer - export-only delivery backend
//!
//! Has no transport. The operator exports the rendered message and
//! pastes it into an external system, so every recipient is reported
//! sent and the instance completes normally.

use async_trait::async_trait;
use herald_common::types::RecipientsSpec;
use herald_common::{Error, Result};
use herald_storage::models::CampaignInstance;
use tracing::debug;

use super::{
    ExportedEmail, Mailer, OutboundCampaign, RecipientList, RecipientOutcome, SendReport,
    SettingField,
};

pub struct CopyPasteMailer;

#[async_trait]
impl Mailer for CopyPasteMailer {
    fn id(&self) -> &str {
        "copypaste"
    }

    fn title(&self) -> &str {
        "Copy/Paste"
    }

    fn define_settings(&self) -> Vec<SettingField> {
        Vec::new()
    }

    async fn get_recipient_lists(&self) -> Result<Vec<RecipientList>> {
        Err(Error::NotSupported(
            "copypaste does not provide recipient lists".to_string(),
        ))
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
        recipients: &[String],
    ) -> Result<SendReport> {
        debug!(recipients = recipients.len(), "Marking copy/paste campaign sent");
        let mut report = SendReport::default();
        for recipient in recipients {
            report.push(RecipientOutcome::sent(recipient.clone()));
        }
        Ok(report)
    }

    async fn send_test(
        &self,
        message: &OutboundCampaign,
        addresses: &[String],
    ) -> Result<SendReport> {
        self.send_campaign(message, addresses).await
    }

    fn export_email(&self, message: &OutboundCampaign) -> Result<ExportedEmail> {
        Ok(ExportedEmail {
            subject: message.subject_line.clone(),
            text_body: message.body.clone(),
            html_body: message.html_body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outbound() -> OutboundCampaign {
        OutboundCampaign {
            subject_line: "Weekly digest".to_string(),
            from_name: None,
            from_email: "digest@example.com".to_string(),
            reply_to: None,
            cc: Vec::new(),
            bcc: Vec::new(),
            body: "Plain digest".to_string(),
            html_body: Some("<h1>Digest</h1>".to_string()),
            enable_attachments: false,
        }
    }

    #[tokio::test]
    async fn test_every_recipient_reported_sent() {
        let recipients = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let report = CopyPasteMailer
            .send_campaign(&outbound(), &recipients)
            .await
            .unwrap();

        assert_eq!(report.sent_count(), 2);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.outcomes[0].address, "a@example.com");
    }

    #[test]
    fn test_export_carries_rendered_content() {
        let exported = CopyPasteMailer.export_email(&outbound()).unwrap();

        assert_eq!(
            exported,
            ExportedEmail {
                subject: "Weekly digest".to_string(),
                text_body: "Plain digest".to_string(),
                html_body: Some("<h1>Digest</h1>".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_recipient_lists_not_supported() {
        let err = CopyPasteMailer.get_recipient_lists().await.unwrap_err();
        assert_eq!(err.code(), "NOT_SUPPORTED");
    }
}

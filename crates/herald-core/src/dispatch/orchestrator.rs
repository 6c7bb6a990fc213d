//! Dispatch orchestrator
//!
//! The engine's event bus. A fired lifecycle event flows through
//! binding lookup, condition evaluation, content rendering, recipient
//! resolution, and mailer delivery; every failure stays inside the
//! binding or recipient it belongs to, and nothing propagates back to
//! the host operation that raised the event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use herald_common::config::DispatchConfig;
use herald_common::types::{Entity, EventParams, InstanceId};
use herald_common::{Error, Result};
use herald_storage::models::{
    Binding, CampaignDefinition, CampaignInstance, CampaignStatus, CreateCampaignInstance,
    CreateDeliveryLogEntry, InstanceStatus,
};
use herald_storage::store::{CampaignStore, DeliveryLog, InstanceStore};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::conditions::ConditionEvaluator;
use crate::content::{render_content, ContentField, RenderContext, RenderedContent, TemplateRenderer};
use crate::dispatch::hooks::{self, PostSendEvent, PostSendHook};
use crate::dispatch::table::BindingTable;
use crate::events::EventRegistry;
use crate::mailers::{Mailer, MailerRegistry, OutboundCampaign, RecipientOutcome, SendReport};
use crate::recipients::{is_placeholder, resolve_recipients, validate_address};

/// Aggregate result of one `fire` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Bindings whose conditions matched.
    pub matched: usize,
    /// Condition non-matches plus matched bindings whose definition
    /// was missing or not ready.
    pub skipped: usize,
    /// Dispatches where every recipient was delivered.
    pub sent: usize,
    /// Dispatches where some recipients failed.
    pub partial: usize,
    /// Dispatches that delivered nothing.
    pub failed: usize,
}

/// Outcome of one binding's pipeline.
enum BindingDispatch {
    Sent,
    Partial,
    Skipped,
    Failed,
}

/// Shared event bus. Hosts hold one instance behind an `Arc` and call
/// [`fire`](Self::fire) from their lifecycle hooks.
#[derive(Clone)]
pub struct DispatchOrchestrator {
    events: Arc<EventRegistry>,
    table: Arc<BindingTable>,
    campaigns: Arc<dyn CampaignStore>,
    instances: Arc<dyn InstanceStore>,
    delivery_log: Arc<dyn DeliveryLog>,
    mailers: Arc<MailerRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    post_send_hooks: Vec<Arc<dyn PostSendHook>>,
    config: DispatchConfig,
}

impl DispatchOrchestrator {
    pub fn new(
        events: Arc<EventRegistry>,
        table: Arc<BindingTable>,
        campaigns: Arc<dyn CampaignStore>,
        instances: Arc<dyn InstanceStore>,
        delivery_log: Arc<dyn DeliveryLog>,
        mailers: Arc<MailerRegistry>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            events,
            table,
            campaigns,
            instances,
            delivery_log,
            mailers,
            renderer,
            post_send_hooks: Vec::new(),
            config: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_post_send_hook(mut self, hook: Arc<dyn PostSendHook>) -> Self {
        self.post_send_hooks.push(hook);
        self
    }

    /// Rebuild the binding table from the store.
    pub async fn reload_bindings(&self) -> Result<()> {
        self.table.reload().await
    }

    pub fn events(&self) -> &Arc<EventRegistry> {
        &self.events
    }

    pub fn mailers(&self) -> &Arc<MailerRegistry> {
        &self.mailers
    }

    /// Dispatch one fired lifecycle event.
    ///
    /// Never fails: the caller is the host operation that raised the
    /// event and must not be affected by delivery problems, so every
    /// error is logged and absorbed into the summary.
    pub async fn fire(
        &self,
        event_key: &str,
        entity: &Entity,
        params: &EventParams,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        // Unregistered keys are expected; hosts fire keys this engine
        // has no descriptor for.
        let descriptor = match self.events.resolve(event_key) {
            Some(descriptor) => descriptor,
            None => {
                debug!(event_key = %event_key, "No descriptor registered, ignoring event");
                return summary;
            }
        };

        let bindings = self.table.bindings_for(event_key).await;
        if bindings.is_empty() {
            debug!(event_key = %event_key, "No enabled bindings");
            return summary;
        }

        let matched =
            ConditionEvaluator::matching(descriptor.as_ref(), &bindings, entity, params);
        summary.matched = matched.len();
        summary.skipped = bindings.len() - matched.len();

        if matched.is_empty() {
            return summary;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_bindings));
        let mut handles = Vec::with_capacity(matched.len());

        for binding in matched {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(binding_id = %binding.id, error = %e, "Dispatch pool closed");
                    summary.failed += 1;
                    continue;
                }
            };

            let orchestrator = self.clone();
            let event_key = event_key.to_string();
            let entity = entity.clone();
            let params = params.clone();

            handles.push(tokio::spawn(async move {
                let outcome = orchestrator
                    .dispatch_binding(&event_key, &binding, &entity, &params)
                    .await;
                drop(permit);
                outcome
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(BindingDispatch::Sent) => summary.sent += 1,
                Ok(BindingDispatch::Partial) => summary.partial += 1,
                Ok(BindingDispatch::Skipped) => summary.skipped += 1,
                Ok(BindingDispatch::Failed) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Binding dispatch task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            event_key = %event_key,
            matched = summary.matched,
            skipped = summary.skipped,
            sent = summary.sent,
            partial = summary.partial,
            failed = summary.failed,
            "Dispatch complete"
        );

        summary
    }

    /// Run one matched binding through render, recipient resolution,
    /// delivery, and bookkeeping.
    async fn dispatch_binding(
        &self,
        event_key: &str,
        binding: &Binding,
        entity: &Entity,
        params: &EventParams,
    ) -> BindingDispatch {
        let definition = match self.campaigns.get(binding.campaign_id).await {
            Ok(Some(definition)) => definition,
            Ok(None) => {
                warn!(
                    binding_id = %binding.id,
                    campaign_id = %binding.campaign_id,
                    "Campaign definition missing, skipping"
                );
                return BindingDispatch::Skipped;
            }
            Err(e) => {
                error!(binding_id = %binding.id, error = %e, "Failed to load campaign definition");
                return BindingDispatch::Failed;
            }
        };

        if definition.status() != CampaignStatus::Ready {
            info!(
                binding_id = %binding.id,
                campaign = %definition.name,
                status = %definition.status(),
                "Campaign not ready, skipping"
            );
            return BindingDispatch::Skipped;
        }

        let context = RenderContext::new(entity, params);
        let content = match render_content(self.renderer.as_ref(), &definition, &context).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    binding_id = %binding.id,
                    campaign = %definition.name,
                    error = %e,
                    "Content rendering failed"
                );
                return BindingDispatch::Failed;
            }
        };

        let mailer = match self.resolve_installed_mailer(&definition.mailer_name).await {
            Ok(mailer) => mailer,
            Err(e) => {
                warn!(
                    binding_id = %binding.id,
                    mailer = %definition.mailer_name,
                    error = %e,
                    "Mailer unavailable"
                );
                return BindingDispatch::Failed;
            }
        };

        let lists = match mailer.get_recipient_lists().await {
            Ok(lists) => lists,
            Err(Error::NotSupported(_)) => Vec::new(),
            Err(e) => {
                warn!(binding_id = %binding.id, error = %e, "Failed to fetch recipient lists");
                Vec::new()
            }
        };

        let recipients =
            resolve_recipients(&definition.recipients, self.renderer.as_ref(), &context, &lists)
                .await;
        for (entry, reason) in &recipients.invalid {
            warn!(
                binding_id = %binding.id,
                recipient = %entry,
                reason = %reason,
                "Recipient rejected"
            );
        }

        if recipients.valid.is_empty() {
            warn!(binding_id = %binding.id, campaign = %definition.name, "No valid recipients");
            return BindingDispatch::Failed;
        }

        // Freeze the attempt before calling out.
        let instance = match self
            .instances
            .create(CreateCampaignInstance {
                campaign_id: definition.id,
                subject_line: content.subject_line.clone(),
                from_name: content.from_name.clone(),
                from_email: content.from_email.clone(),
                reply_to: content.reply_to.clone(),
                recipients_snapshot: recipients.valid.clone(),
                status: InstanceStatus::Sending,
            })
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                error!(binding_id = %binding.id, error = %e, "Failed to create campaign instance");
                return BindingDispatch::Failed;
            }
        };

        if !definition.recipients.lists.is_empty() {
            match mailer
                .prepare_recipient_lists(&instance, &definition.recipients)
                .await
            {
                Ok(prepared) => {
                    debug!(instance_id = %instance.id, lists = ?prepared, "Instance targets lists")
                }
                Err(e) => {
                    warn!(instance_id = %instance.id, error = %e, "Failed to prepare recipient lists")
                }
            }
        }

        let message = outbound_campaign(&definition, &content);

        let report = match tokio::time::timeout(
            Duration::from_secs(self.config.mailer_timeout_secs),
            mailer.send_campaign(&message, &recipients.valid),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                warn!(
                    binding_id = %binding.id,
                    mailer = %definition.mailer_name,
                    error = %e,
                    "Mailer rejected campaign"
                );
                failure_report(&recipients.valid, &e.to_string())
            }
            Err(_) => {
                warn!(
                    binding_id = %binding.id,
                    mailer = %definition.mailer_name,
                    timeout_secs = self.config.mailer_timeout_secs,
                    "Mailer call timed out"
                );
                failure_report(&recipients.valid, "Mailer call timed out")
            }
        };

        // Rejected addresses share the log and the outcome accounting
        // with attempted ones.
        let mut full_report = report;
        for (entry, reason) in recipients.invalid {
            full_report.push(RecipientOutcome::failed(entry, reason));
        }

        self.log_outcomes(&instance, &content, &full_report, false).await;

        let status = if full_report.any_sent() {
            if full_report.failed_count() == 0 {
                InstanceStatus::Sent
            } else {
                InstanceStatus::PartialFailure
            }
        } else {
            InstanceStatus::Error
        };
        let sent_at = if full_report.any_sent() {
            Some(Utc::now())
        } else {
            None
        };

        let updated = match self.instances.mark_outcome(instance.id, status, sent_at).await {
            Ok(updated) => updated,
            Err(e) => {
                error!(instance_id = %instance.id, error = %e, "Failed to record instance outcome");
                instance
            }
        };

        if full_report.any_sent() {
            let event = PostSendEvent {
                event_key: event_key.to_string(),
                binding_id: binding.id,
                campaign_id: definition.id,
                instance: updated,
                report: full_report,
            };
            hooks::notify(&self.post_send_hooks, &event).await;
        }

        match status {
            InstanceStatus::Sent => BindingDispatch::Sent,
            InstanceStatus::PartialFailure => BindingDispatch::Partial,
            _ => BindingDispatch::Failed,
        }
    }

    /// Send an existing instance's content to explicit test addresses.
    ///
    /// The admin-facing path: unlike `fire` it returns errors to its
    /// caller. Subject and sender identity come from the instance as
    /// frozen; bodies render against an empty context. Deliveries are
    /// logged with `is_test` set and the instance status and `sent_at`
    /// stay untouched.
    pub async fn send_test(
        &self,
        instance_id: InstanceId,
        addresses: &[String],
    ) -> Result<SendReport> {
        if addresses.is_empty() {
            return Err(Error::Validation("No test recipients given".to_string()));
        }
        for address in addresses {
            // Placeholders have no entity to resolve against here.
            if is_placeholder(address) || !validate_address(address) {
                return Err(Error::Validation(format!(
                    "Invalid test recipient: {}",
                    address
                )));
            }
        }

        let instance = self
            .instances
            .get(instance_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign instance {}", instance_id)))?;
        let definition = self
            .campaigns
            .get(instance.campaign_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign {}", instance.campaign_id)))?;
        let mailer = self.resolve_installed_mailer(&definition.mailer_name).await?;

        let entity = Entity::new("preview", "0");
        let params = EventParams::new();
        let context = RenderContext::new(&entity, &params);

        let body = self
            .renderer
            .render(&definition.body_template, &context)
            .await
            .map_err(|e| Error::render(ContentField::Body, e.to_string()))?;
        let html_body = match &definition.html_body_template {
            Some(source) => self.renderer.render(source, &context).await.ok(),
            None => None,
        };

        let content = RenderedContent {
            subject_line: format!("{}{}", self.config.test_subject_prefix, instance.subject_line),
            from_name: instance.from_name.clone(),
            from_email: instance.from_email.clone(),
            reply_to: instance.reply_to.clone(),
            body,
            html_body,
        };
        let message = outbound_campaign(&definition, &content);

        let report = tokio::time::timeout(
            Duration::from_secs(self.config.mailer_timeout_secs),
            mailer.send_test(&message, addresses),
        )
        .await
        .map_err(|_| Error::Timeout(format!("Mailer {} test send", definition.mailer_name)))??;

        self.log_outcomes(&instance, &content, &report, true).await;

        info!(
            instance_id = %instance.id,
            recipients = addresses.len(),
            sent = report.sent_count(),
            failed = report.failed_count(),
            "Test send complete"
        );

        Ok(report)
    }

    async fn resolve_installed_mailer(&self, name: &str) -> Result<Arc<dyn Mailer>> {
        let mailer = self.mailers.resolve(name)?;
        if !self.mailers.is_installed(name).await? {
            return Err(Error::Config(format!("Mailer {} is not installed", name)));
        }
        Ok(mailer)
    }

    /// Append one delivery log row per recipient outcome.
    async fn log_outcomes(
        &self,
        instance: &CampaignInstance,
        content: &RenderedContent,
        report: &SendReport,
        is_test: bool,
    ) {
        let snapshot = content_snapshot(content);
        for outcome in &report.outcomes {
            let entry = CreateDeliveryLogEntry {
                instance_id: instance.id,
                recipient: outcome.address.clone(),
                outcome: outcome.outcome,
                error_message: outcome.error.clone(),
                content_snapshot: snapshot.clone(),
                is_test,
            };
            if let Err(e) = self.delivery_log.append(entry).await {
                error!(
                    instance_id = %instance.id,
                    recipient = %outcome.address,
                    error = %e,
                    "Failed to append delivery log entry"
                );
            }
        }
    }
}

fn outbound_campaign(definition: &CampaignDefinition, content: &RenderedContent) -> OutboundCampaign {
    OutboundCampaign {
        subject_line: content.subject_line.clone(),
        from_name: content.from_name.clone(),
        from_email: content.from_email.clone(),
        reply_to: content.reply_to.clone(),
        cc: definition.cc.clone(),
        bcc: definition.bcc.clone(),
        body: content.body.clone(),
        html_body: content.html_body.clone(),
        enable_attachments: definition.enable_attachments,
    }
}

fn failure_report(recipients: &[String], reason: &str) -> SendReport {
    let mut report = SendReport::default();
    for recipient in recipients {
        report.push(RecipientOutcome::failed(recipient.clone(), reason.to_string()));
    }
    report
}

/// Subject plus a bounded body preview, stored with each log row.
fn content_snapshot(content: &RenderedContent) -> serde_json::Value {
    serde_json::json!({
        "subject": content.subject_line,
        "body_preview": preview(&content.body, 200),
    })
}

fn preview(text: &str, limit: usize) -> String {
    let mut preview: String = text.chars().take(limit).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}

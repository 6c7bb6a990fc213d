//! Post-send hooks
//!
//! Observers notified after a dispatch delivered to at least one
//! recipient. Hooks run sequentially and are isolated from each other
//! and from the dispatch outcome: a failing observer is logged, never
//! propagated.

use std::sync::Arc;

use async_trait::async_trait;
use herald_common::types::{BindingId, CampaignId};
use herald_common::Result;
use herald_storage::models::CampaignInstance;
use tracing::warn;

use crate::mailers::SendReport;

/// Payload handed to post-send observers.
#[derive(Debug, Clone)]
pub struct PostSendEvent {
    pub event_key: String,
    pub binding_id: BindingId,
    pub campaign_id: CampaignId,
    /// The instance after its outcome was recorded.
    pub instance: CampaignInstance,
    pub report: SendReport,
}

#[async_trait]
pub trait PostSendHook: Send + Sync {
    async fn on_campaign_sent(&self, event: &PostSendEvent) -> Result<()>;
}

/// Invoke every hook with the same event.
pub(crate) async fn notify(hooks: &[Arc<dyn PostSendHook>], event: &PostSendEvent) {
    for hook in hooks {
        if let Err(e) = hook.on_campaign_sent(event).await {
            warn!(
                binding_id = %event.binding_id,
                instance_id = %event.instance.id,
                error = %e,
                "Post-send hook failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_common::Error;
    use herald_storage::models::InstanceStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PostSendHook for CountingHook {
        async fn on_campaign_sent(&self, _event: &PostSendEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl PostSendHook for FailingHook {
        async fn on_campaign_sent(&self, _event: &PostSendEvent) -> Result<()> {
            Err(Error::Internal("observer offline".to_string()))
        }
    }

    fn event() -> PostSendEvent {
        PostSendEvent {
            event_key: "entries.save".to_string(),
            binding_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            instance: CampaignInstance {
                id: Uuid::new_v4(),
                campaign_id: Uuid::new_v4(),
                subject_line: "Subject".to_string(),
                from_name: None,
                from_email: "a@example.com".to_string(),
                reply_to: None,
                recipients_snapshot: Vec::new(),
                status: InstanceStatus::Sent.to_string(),
                error: false,
                sent_at: Some(Utc::now()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            report: SendReport::default(),
        }
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_later_hooks() {
        let counting = Arc::new(CountingHook::default());
        let hooks: Vec<Arc<dyn PostSendHook>> = vec![Arc::new(FailingHook), counting.clone()];

        notify(&hooks, &event()).await;

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_hooks_receive_the_event() {
        let first = Arc::new(CountingHook::default());
        let second = Arc::new(CountingHook::default());
        let hooks: Vec<Arc<dyn PostSendHook>> = vec![first.clone(), second.clone()];

        notify(&hooks, &event()).await;
        notify(&hooks, &event()).await;

        assert_eq!(first.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.calls.load(Ordering::SeqCst), 2);
    }
}

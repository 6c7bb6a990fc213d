//! Campaign instance repository

use crate::db::DatabasePool;
use crate::models::{
    subject_line_as_new, CampaignInstance, CreateCampaignInstance, InstanceStatus,
};
use crate::store::InstanceStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::types::{CampaignId, InstanceId};
use herald_common::{Error, Result};
use uuid::Uuid;

/// PostgreSQL campaign instance store
pub struct PgInstanceStore {
    pool: DatabasePool,
}

impl PgInstanceStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for PgInstanceStore {
    async fn create(&self, input: CreateCampaignInstance) -> Result<CampaignInstance> {
        let id = Uuid::new_v4();
        let status = input.status.to_string();

        sqlx::query_as::<_, CampaignInstance>(
            r#"
            INSERT INTO campaign_instances (
                id, campaign_id, subject_line, from_name, from_email, reply_to,
                recipients_snapshot, status, error, sent_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, NULL, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(&input.subject_line)
        .bind(&input.from_name)
        .bind(&input.from_email)
        .bind(&input.reply_to)
        .bind(&input.recipients_snapshot)
        .bind(&status)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: InstanceId) -> Result<Option<CampaignInstance>> {
        sqlx::query_as::<_, CampaignInstance>("SELECT * FROM campaign_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<CampaignInstance>> {
        sqlx::query_as::<_, CampaignInstance>(
            "SELECT * FROM campaign_instances WHERE campaign_id = $1 ORDER BY created_at DESC",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn mark_outcome(
        &self,
        id: InstanceId,
        status: InstanceStatus,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<CampaignInstance> {
        // The rank guard makes the transition monotonic under
        // concurrent dispatches; COALESCE keeps the first sent_at.
        let updated = sqlx::query_as::<_, CampaignInstance>(
            r#"
            UPDATE campaign_instances SET
                status = $2,
                error = $3,
                sent_at = COALESCE(sent_at, $4),
                updated_at = NOW()
            WHERE id = $1
              AND CASE status
                    WHEN 'draft' THEN 0
                    WHEN 'scheduled' THEN 1
                    WHEN 'sending' THEN 2
                    WHEN 'error' THEN 3
                    WHEN 'partial_failure' THEN 4
                    WHEN 'sent' THEN 5
                    ELSE 0
                  END < $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(status == InstanceStatus::Error)
        .bind(sent_at)
        .bind(status.rank() as i16)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        match updated {
            Some(instance) => Ok(instance),
            // Lost the compare-and-set or unknown ID; return what is stored
            None => self
                .get(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Campaign instance {}", id))),
        }
    }

    async fn save_as_new(&self, id: InstanceId) -> Result<CampaignInstance> {
        let original = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Campaign instance {}", id)))?;

        let siblings: Vec<String> = sqlx::query_scalar(
            "SELECT subject_line FROM campaign_instances WHERE campaign_id = $1",
        )
        .bind(original.campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let subject_line = subject_line_as_new(&original.subject_line, &siblings);

        self.create(CreateCampaignInstance {
            campaign_id: original.campaign_id,
            subject_line,
            from_name: original.from_name,
            from_email: original.from_email,
            reply_to: original.reply_to,
            recipients_snapshot: original.recipients_snapshot,
            status: InstanceStatus::Draft,
        })
        .await
    }
}

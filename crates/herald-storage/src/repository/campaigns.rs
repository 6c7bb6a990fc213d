//! Campaign definition repository

use crate::db::DatabasePool;
use crate::models::{CampaignDefinition, CreateCampaignDefinition};
use crate::store::CampaignStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::types::{CampaignId, RecipientsSpec};
use herald_common::{Error, Result};
use sqlx::FromRow;
use uuid::Uuid;

/// PostgreSQL campaign definition store
pub struct PgCampaignStore {
    pool: DatabasePool,
}

impl PgCampaignStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Raw row with the recipients spec still JSON-encoded
#[derive(FromRow)]
struct CampaignRow {
    id: CampaignId,
    name: String,
    mailer_name: String,
    subject_template: String,
    from_name: Option<String>,
    from_email: String,
    reply_to_email: Option<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    body_template: String,
    html_body_template: Option<String>,
    recipients: serde_json::Value,
    enable_attachments: bool,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for CampaignDefinition {
    type Error = Error;

    fn try_from(row: CampaignRow) -> Result<CampaignDefinition> {
        let recipients: RecipientsSpec = serde_json::from_value(row.recipients)?;
        Ok(CampaignDefinition {
            id: row.id,
            name: row.name,
            mailer_name: row.mailer_name,
            subject_template: row.subject_template,
            from_name: row.from_name,
            from_email: row.from_email,
            reply_to_email: row.reply_to_email,
            cc: row.cc,
            bcc: row.bcc,
            body_template: row.body_template,
            html_body_template: row.html_body_template,
            recipients,
            enable_attachments: row.enable_attachments,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn create(&self, input: CreateCampaignDefinition) -> Result<CampaignDefinition> {
        let id = Uuid::new_v4();
        let recipients = serde_json::to_value(&input.recipients)?;

        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            INSERT INTO campaign_definitions (
                id, name, mailer_name, subject_template, from_name, from_email,
                reply_to_email, cc, bcc, body_template, html_body_template,
                recipients, enable_attachments, enabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.mailer_name)
        .bind(&input.subject_template)
        .bind(&input.from_name)
        .bind(&input.from_email)
        .bind(&input.reply_to_email)
        .bind(&input.cc)
        .bind(&input.bcc)
        .bind(&input.body_template)
        .bind(&input.html_body_template)
        .bind(&recipients)
        .bind(input.enable_attachments)
        .bind(input.enabled)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.try_into()
    }

    async fn get(&self, id: CampaignId) -> Result<Option<CampaignDefinition>> {
        let row =
            sqlx::query_as::<_, CampaignRow>("SELECT * FROM campaign_definitions WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        row.map(CampaignDefinition::try_from).transpose()
    }

    async fn update(&self, definition: &CampaignDefinition) -> Result<CampaignDefinition> {
        let recipients = serde_json::to_value(&definition.recipients)?;

        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            UPDATE campaign_definitions SET
                name = $2,
                mailer_name = $3,
                subject_template = $4,
                from_name = $5,
                from_email = $6,
                reply_to_email = $7,
                cc = $8,
                bcc = $9,
                body_template = $10,
                html_body_template = $11,
                recipients = $12,
                enable_attachments = $13,
                enabled = $14,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(definition.id)
        .bind(&definition.name)
        .bind(&definition.mailer_name)
        .bind(&definition.subject_template)
        .bind(&definition.from_name)
        .bind(&definition.from_email)
        .bind(&definition.reply_to_email)
        .bind(&definition.cc)
        .bind(&definition.bcc)
        .bind(&definition.body_template)
        .bind(&definition.html_body_template)
        .bind(&recipients)
        .bind(definition.enable_attachments)
        .bind(definition.enabled)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(Error::NotFound(format!("Campaign {}", definition.id))),
        }
    }

    async fn list(&self) -> Result<Vec<CampaignDefinition>> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            "SELECT * FROM campaign_definitions ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(CampaignDefinition::try_from).collect()
    }

    async fn delete(&self, id: CampaignId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaign_definitions WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

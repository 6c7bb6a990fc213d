//! Binding repository

use crate::db::DatabasePool;
use crate::models::{Binding, CreateBinding};
use crate::store::BindingStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_common::types::{BindingId, CampaignId, OptionsBlob};
use herald_common::{Error, Result};
use sqlx::FromRow;
use uuid::Uuid;

/// PostgreSQL binding store
pub struct PgBindingStore {
    pool: DatabasePool,
}

impl PgBindingStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Raw row with the options envelope still JSON-encoded
#[derive(FromRow)]
struct BindingRow {
    id: BindingId,
    event_key: String,
    campaign_id: CampaignId,
    options: serde_json::Value,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BindingRow> for Binding {
    type Error = Error;

    fn try_from(row: BindingRow) -> Result<Binding> {
        let options: OptionsBlob = serde_json::from_value(row.options)?;
        Ok(Binding {
            id: row.id,
            event_key: row.event_key,
            campaign_id: row.campaign_id,
            options,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BindingStore for PgBindingStore {
    async fn create(&self, input: CreateBinding) -> Result<Binding> {
        let id = Uuid::new_v4();
        let options = serde_json::to_value(&input.options)?;

        let row = sqlx::query_as::<_, BindingRow>(
            r#"
            INSERT INTO event_bindings (id, event_key, campaign_id, options, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.event_key)
        .bind(input.campaign_id)
        .bind(&options)
        .bind(input.enabled)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.try_into()
    }

    async fn get(&self, id: BindingId) -> Result<Option<Binding>> {
        let row = sqlx::query_as::<_, BindingRow>("SELECT * FROM event_bindings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Binding::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM event_bindings ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Binding::try_from).collect()
    }

    async fn list_by_event(&self, event_key: &str) -> Result<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM event_bindings WHERE event_key = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(event_key)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Binding::try_from).collect()
    }

    async fn set_enabled(&self, id: BindingId, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE event_bindings SET enabled = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: BindingId) -> Result<()> {
        sqlx::query("DELETE FROM event_bindings WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_campaign(&self, campaign_id: CampaignId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM event_bindings WHERE campaign_id = $1")
            .bind(campaign_id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

//! Delivery log repository

use crate::db::DatabasePool;
use crate::models::{CreateDeliveryLogEntry, DeliveryLogEntry};
use crate::store::DeliveryLog;
use async_trait::async_trait;
use herald_common::types::InstanceId;
use herald_common::{Error, Result};
use uuid::Uuid;

/// PostgreSQL delivery log
pub struct PgDeliveryLog {
    pool: DatabasePool,
}

impl PgDeliveryLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLog for PgDeliveryLog {
    async fn append(&self, entry: CreateDeliveryLogEntry) -> Result<DeliveryLogEntry> {
        let id = Uuid::new_v4();
        let outcome = entry.outcome.to_string();

        sqlx::query_as::<_, DeliveryLogEntry>(
            r#"
            INSERT INTO delivery_log (
                id, instance_id, recipient, outcome, error_message,
                content_snapshot, is_test, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(entry.instance_id)
        .bind(&entry.recipient)
        .bind(&outcome)
        .bind(&entry.error_message)
        .bind(&entry.content_snapshot)
        .bind(entry.is_test)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_instance(&self, instance_id: InstanceId) -> Result<Vec<DeliveryLogEntry>> {
        sqlx::query_as::<_, DeliveryLogEntry>(
            "SELECT * FROM delivery_log WHERE instance_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(instance_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_by_instance(&self, instance_id: InstanceId) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM delivery_log WHERE instance_id = $1")
                .bind(instance_id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count)
    }
}

//! Installed-mailer settings repository

use crate::db::DatabasePool;
use crate::models::MailerRecord;
use crate::store::MailerSettingsStore;
use async_trait::async_trait;
use herald_common::{Error, Result};

/// PostgreSQL mailer settings store
pub struct PgMailerSettingsStore {
    pool: DatabasePool,
}

impl PgMailerSettingsStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailerSettingsStore for PgMailerSettingsStore {
    async fn install(&self, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO mailer_settings (name, settings, installed_at)
            VALUES ($1, '{}', NOW())
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn uninstall(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mailer_settings WHERE name = $1")
            .bind(name)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, name: &str) -> Result<Option<MailerRecord>> {
        sqlx::query_as::<_, MailerRecord>("SELECT * FROM mailer_settings WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.get(name).await?.is_some())
    }

    async fn update_settings(&self, name: &str, settings: serde_json::Value) -> Result<()> {
        let result = sqlx::query("UPDATE mailer_settings SET settings = $2 WHERE name = $1")
            .bind(name)
            .bind(&settings)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Mailer {} is not installed", name)));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MailerRecord>> {
        sqlx::query_as::<_, MailerRecord>("SELECT * FROM mailer_settings ORDER BY name ASC")
            .fetch_all(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

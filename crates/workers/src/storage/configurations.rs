use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use riskwatch_common::model::{AlertConfiguration, AlertType};
use riskwatch_common::repository::{ConfigurationRepository, RepoError};

use super::backend;

#[derive(Clone)]
pub struct PgConfigurationRepository {
    pool: PgPool,
}

impl PgConfigurationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigurationRepository for PgConfigurationRepository {
    async fn save(&self, configuration: &AlertConfiguration) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO alert_configurations (id, alert_type, enabled, created_at_ms, body)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (id) DO UPDATE
               SET alert_type = EXCLUDED.alert_type,
                   enabled = EXCLUDED.enabled,
                   body = EXCLUDED.body"#,
        )
        .bind(&configuration.id)
        .bind(configuration.alert_type.as_str())
        .bind(configuration.enabled)
        .bind(configuration.created_at_ms)
        .bind(Json(configuration))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AlertConfiguration>, RepoError> {
        let row: Option<Json<AlertConfiguration>> =
            sqlx::query_scalar("SELECT body FROM alert_configurations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(|Json(c)| c))
    }

    async fn find_all(&self) -> Result<Vec<AlertConfiguration>, RepoError> {
        let rows: Vec<Json<AlertConfiguration>> = sqlx::query_scalar(
            "SELECT body FROM alert_configurations ORDER BY created_at_ms, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn find_by_type_and_enabled(
        &self,
        alert_type: AlertType,
    ) -> Result<Vec<AlertConfiguration>, RepoError> {
        let rows: Vec<Json<AlertConfiguration>> = sqlx::query_scalar(
            r#"SELECT body FROM alert_configurations
               WHERE alert_type = $1 AND enabled
               ORDER BY created_at_ms, id"#,
        )
        .bind(alert_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(c)| c).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM alert_configurations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}

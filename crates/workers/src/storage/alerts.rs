use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use riskwatch_common::model::{Alert, AlertStatus};
use riskwatch_common::repository::{
    AlertCursor, AlertRepository, Page, PageRequest, RepoError, StatusCounts,
};

use super::backend;

#[derive(Clone)]
pub struct PgAlertRepository {
    pool: PgPool,
}

impl PgAlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn save(&self, alert: &Alert) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO alerts (id, alert_type, status, created_at_ms, updated_at_ms, version, body)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE
               SET status = EXCLUDED.status,
                   updated_at_ms = EXCLUDED.updated_at_ms,
                   version = EXCLUDED.version,
                   body = EXCLUDED.body"#,
        )
        .bind(&alert.id)
        .bind(alert.alert_type.as_str())
        .bind(alert.status.as_str())
        .bind(alert.created_at_ms)
        .bind(alert.updated_at_ms)
        .bind(alert.version as i64)
        .bind(Json(alert))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Alert>, RepoError> {
        let row: Option<Json<Alert>> = sqlx::query_scalar("SELECT body FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|Json(a)| a))
    }

    async fn find_by_status(
        &self,
        status: Option<AlertStatus>,
        page: PageRequest,
    ) -> Result<Page<Alert>, RepoError> {
        let status = status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        let rows: Vec<Json<Alert>> = sqlx::query_scalar(
            r#"SELECT body FROM alerts
               WHERE ($1::text IS NULL OR status = $1)
               ORDER BY created_at_ms DESC, id
               LIMIT $2 OFFSET $3"#,
        )
        .bind(status)
        .bind(page.size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Page {
            items: rows.into_iter().map(|Json(a)| a).collect(),
            page: page.page,
            size: page.size,
            total: total as u64,
        })
    }

    async fn find_by_status_after(
        &self,
        status: AlertStatus,
        after: Option<&AlertCursor>,
        limit: usize,
    ) -> Result<Vec<Alert>, RepoError> {
        let rows: Vec<Json<Alert>> = sqlx::query_scalar(
            r#"SELECT body FROM alerts
               WHERE status = $1
                 AND ($2::bigint IS NULL OR (created_at_ms, id) > ($2, $3))
               ORDER BY created_at_ms, id
               LIMIT $4"#,
        )
        .bind(status.as_str())
        .bind(after.map(|c| c.created_at_ms))
        .bind(after.map(|c| c.id.as_str()).unwrap_or(""))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(a)| a).collect())
    }

    async fn replace_if_version(
        &self,
        alert: &Alert,
        expected_version: u64,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"UPDATE alerts
               SET status = $2, updated_at_ms = $3, version = $4, body = $5
               WHERE id = $1 AND version = $6"#,
        )
        .bind(&alert.id)
        .bind(alert.status.as_str())
        .bind(alert.updated_at_ms)
        .bind(alert.version as i64)
        .bind(Json(alert))
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_by_status(&self) -> Result<StatusCounts, RepoError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM alerts GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status: AlertStatus = status
                .parse()
                .map_err(|e: riskwatch_common::model::ParseEnumError| RepoError::Corrupt(e.to_string()))?;
            counts.add(status, count as u64);
        }
        Ok(counts)
    }
}

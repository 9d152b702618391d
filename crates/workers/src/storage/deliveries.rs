use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use riskwatch_common::model::NotificationDelivery;
use riskwatch_common::repository::{DeliveryRepository, RepoError};

use super::backend;

#[derive(Clone)]
pub struct PgDeliveryRepository {
    pool: PgPool,
}

impl PgDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRepository for PgDeliveryRepository {
    async fn save(&self, delivery: &NotificationDelivery) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO notification_deliveries
               (id, alert_id, status, next_retry_at_ms, created_at_ms, updated_at_ms, body)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE
               SET status = EXCLUDED.status,
                   next_retry_at_ms = EXCLUDED.next_retry_at_ms,
                   updated_at_ms = EXCLUDED.updated_at_ms,
                   body = EXCLUDED.body"#,
        )
        .bind(&delivery.id)
        .bind(&delivery.alert_id)
        .bind(delivery.status.as_str())
        .bind(delivery.next_retry_at_ms)
        .bind(delivery.created_at_ms)
        .bind(delivery.updated_at_ms)
        .bind(Json(delivery))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationDelivery>, RepoError> {
        let row: Option<Json<NotificationDelivery>> =
            sqlx::query_scalar("SELECT body FROM notification_deliveries WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(|Json(d)| d))
    }

    async fn find_by_alert(&self, alert_id: &str) -> Result<Vec<NotificationDelivery>, RepoError> {
        let rows: Vec<Json<NotificationDelivery>> = sqlx::query_scalar(
            r#"SELECT body FROM notification_deliveries
               WHERE alert_id = $1
               ORDER BY created_at_ms, id"#,
        )
        .bind(alert_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(d)| d).collect())
    }

    async fn find_retry_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        let rows: Vec<Json<NotificationDelivery>> = sqlx::query_scalar(
            r#"SELECT body FROM notification_deliveries
               WHERE status = 'PENDING_RETRY' AND next_retry_at_ms <= $1
               ORDER BY next_retry_at_ms
               LIMIT $2"#,
        )
        .bind(now_ms)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(d)| d).collect())
    }

    async fn claim_for_retry(
        &self,
        id: &str,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        // Single conditional UPDATE: only one worker can see PENDING_RETRY.
        let row: Option<Json<NotificationDelivery>> = sqlx::query_scalar(
            r#"UPDATE notification_deliveries
               SET status = 'PENDING',
                   next_retry_at_ms = NULL,
                   updated_at_ms = $2,
                   body = body
                       || jsonb_build_object(
                            'status', 'PENDING',
                            'attempt', (body->>'attempt')::int + 1,
                            'next_retry_at_ms', NULL,
                            'updated_at_ms', $2::bigint)
               WHERE id = $1
                 AND status = 'PENDING_RETRY'
                 AND next_retry_at_ms <= $2
               RETURNING body"#,
        )
        .bind(id)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(|Json(d)| d))
    }

    async fn find_stale_pending(
        &self,
        cutoff_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        let rows: Vec<Json<NotificationDelivery>> = sqlx::query_scalar(
            r#"SELECT body FROM notification_deliveries
               WHERE status = 'PENDING' AND updated_at_ms < $1
               ORDER BY updated_at_ms
               LIMIT $2"#,
        )
        .bind(cutoff_ms)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|Json(d)| d).collect())
    }

    async fn reclaim_stale(
        &self,
        id: &str,
        cutoff_ms: i64,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        let row: Option<Json<NotificationDelivery>> = sqlx::query_scalar(
            r#"UPDATE notification_deliveries
               SET updated_at_ms = $3,
                   body = body || jsonb_build_object('updated_at_ms', $3::bigint)
               WHERE id = $1
                 AND status = 'PENDING'
                 AND updated_at_ms < $2
               RETURNING body"#,
        )
        .bind(id)
        .bind(cutoff_ms)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(|Json(d)| d))
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"DELETE FROM notification_deliveries
               WHERE status IN ('SENT', 'EXHAUSTED') AND updated_at_ms < $1"#,
        )
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected())
    }
}

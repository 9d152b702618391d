use std::sync::Arc;
use std::time::Duration;

use riskwatch_common::model::{DeliveryDraft, DeliveryStatus, NotificationDelivery};
use riskwatch_common::repository::{DeliveryRepository, RepoError};
use riskwatch_common::retry::exponential_delay;

use crate::notifier::NotifyError;

pub fn next_retry_delay(base: Duration, attempt: u32, ceiling: Duration) -> Duration {
    exponential_delay(base, attempt, ceiling)
}

/// Persists delivery outcomes and decides what gets replayed.
#[derive(Clone)]
pub struct DeliveryTracker {
    repo: Arc<dyn DeliveryRepository>,
    backoff_ceiling: Duration,
}

impl DeliveryTracker {
    pub fn new(repo: Arc<dyn DeliveryRepository>, backoff_ceiling: Duration) -> Self {
        Self {
            repo,
            backoff_ceiling,
        }
    }

    pub async fn open(
        &self,
        draft: DeliveryDraft,
        now_ms: i64,
    ) -> Result<NotificationDelivery, RepoError> {
        let delivery = NotificationDelivery::open(draft, now_ms);
        self.repo.save(&delivery).await?;
        Ok(delivery)
    }

    /// Applies one send result to a PENDING delivery. Failures pass through
    /// FAILED and land on PENDING_RETRY or EXHAUSTED before being saved, so
    /// no attempt is ever left ambiguous.
    pub async fn record(
        &self,
        mut delivery: NotificationDelivery,
        result: &Result<(), NotifyError>,
        now_ms: i64,
    ) -> Result<NotificationDelivery, RepoError> {
        if delivery.status != DeliveryStatus::Pending {
            tracing::warn!(
                delivery_id = %delivery.id,
                status = delivery.status.as_str(),
                "ignoring result for delivery that is not pending"
            );
            return Ok(delivery);
        }

        delivery.updated_at_ms = now_ms;
        match result {
            Ok(()) => {
                delivery.status = DeliveryStatus::Sent;
                delivery.last_error = None;
                delivery.failure = None;
                delivery.next_retry_at_ms = None;
            }
            Err(e) => {
                delivery.status = DeliveryStatus::Failed;
                delivery.last_error = Some(e.message.clone());
                delivery.failure = Some(e.kind);

                if e.is_transient() && delivery.attempt < delivery.max_attempts {
                    let delay = next_retry_delay(
                        Duration::from_millis(delivery.backoff_base_ms),
                        delivery.attempt,
                        self.backoff_ceiling,
                    );
                    delivery.status = DeliveryStatus::PendingRetry;
                    delivery.next_retry_at_ms = Some(now_ms.saturating_add(delay.as_millis() as i64));
                } else {
                    delivery.status = DeliveryStatus::Exhausted;
                    delivery.next_retry_at_ms = None;
                    tracing::warn!(
                        delivery_id = %delivery.id,
                        alert_id = %delivery.alert_id,
                        channel = %delivery.channel,
                        attempt = delivery.attempt,
                        error = %e,
                        "delivery exhausted"
                    );
                }
            }
        }

        self.repo.save(&delivery).await?;
        Ok(delivery)
    }

    pub async fn due_for_retry(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        self.repo.find_retry_due(now_ms, limit).await
    }

    pub async fn claim(
        &self,
        id: &str,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        self.repo.claim_for_retry(id, now_ms).await
    }

    /// PENDING records untouched since before `cutoff_ms`: the process that
    /// opened or claimed them stopped before recording an outcome.
    pub async fn stale_pending(
        &self,
        cutoff_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        self.repo.find_stale_pending(cutoff_ms, limit).await
    }

    pub async fn reclaim_stale(
        &self,
        id: &str,
        cutoff_ms: i64,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        self.repo.reclaim_stale(id, cutoff_ms, now_ms).await
    }

    pub async fn purge_older_than(&self, cutoff_ms: i64) -> Result<u64, RepoError> {
        self.repo.delete_older_than(cutoff_ms).await
    }

    pub async fn for_alert(&self, alert_id: &str) -> Result<Vec<NotificationDelivery>, RepoError> {
        self.repo.find_by_alert(alert_id).await
    }
}

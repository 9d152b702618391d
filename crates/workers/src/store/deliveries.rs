use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use riskwatch_common::model::{DeliveryStatus, NotificationDelivery};
use riskwatch_common::repository::{DeliveryRepository, RepoError};

#[derive(Clone, Default)]
pub struct MemoryDeliveryRepository {
    deliveries: Arc<DashMap<String, NotificationDelivery>>,
}

impl MemoryDeliveryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.deliveries.len()
    }
}

#[async_trait]
impl DeliveryRepository for MemoryDeliveryRepository {
    async fn save(&self, delivery: &NotificationDelivery) -> Result<(), RepoError> {
        self.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationDelivery>, RepoError> {
        Ok(self.deliveries.get(id).map(|d| d.clone()))
    }

    async fn find_by_alert(&self, alert_id: &str) -> Result<Vec<NotificationDelivery>, RepoError> {
        let mut found: Vec<NotificationDelivery> = self
            .deliveries
            .iter()
            .filter(|d| d.alert_id == alert_id)
            .map(|d| d.value().clone())
            .collect();
        found.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(found)
    }

    async fn find_retry_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        let mut due: Vec<NotificationDelivery> = self
            .deliveries
            .iter()
            .filter(|d| d.is_retry_due(now_ms))
            .map(|d| d.value().clone())
            .collect();
        due.sort_by_key(|d| d.next_retry_at_ms);
        due.truncate(limit);
        Ok(due)
    }

    async fn claim_for_retry(
        &self,
        id: &str,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        let Some(mut entry) = self.deliveries.get_mut(id) else {
            return Ok(None);
        };
        if !entry.is_retry_due(now_ms) {
            return Ok(None);
        }
        entry.status = DeliveryStatus::Pending;
        entry.attempt += 1;
        entry.next_retry_at_ms = None;
        entry.updated_at_ms = now_ms;
        Ok(Some(entry.clone()))
    }

    async fn find_stale_pending(
        &self,
        cutoff_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError> {
        let mut stale: Vec<NotificationDelivery> = self
            .deliveries
            .iter()
            .filter(|d| d.is_stale_pending(cutoff_ms))
            .map(|d| d.value().clone())
            .collect();
        stale.sort_by_key(|d| d.updated_at_ms);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn reclaim_stale(
        &self,
        id: &str,
        cutoff_ms: i64,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError> {
        let Some(mut entry) = self.deliveries.get_mut(id) else {
            return Ok(None);
        };
        if !entry.is_stale_pending(cutoff_ms) {
            return Ok(None);
        }
        entry.updated_at_ms = now_ms;
        Ok(Some(entry.clone()))
    }

    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, RepoError> {
        let mut purged = 0u64;
        self.deliveries.retain(|_, d| {
            let expired = d.status.is_terminal() && d.updated_at_ms < cutoff_ms;
            if expired {
                purged += 1;
            }
            !expired
        });
        Ok(purged)
    }
}

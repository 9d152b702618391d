use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use riskwatch_common::model::{Alert, AlertStatus};
use riskwatch_common::repository::{
    AlertCursor, AlertRepository, Page, PageRequest, RepoError, StatusCounts,
};

#[derive(Clone, Default)]
pub struct MemoryAlertRepository {
    alerts: Arc<DashMap<String, Alert>>,
}

impl MemoryAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.alerts.len()
    }
}

#[async_trait]
impl AlertRepository for MemoryAlertRepository {
    async fn save(&self, alert: &Alert) -> Result<(), RepoError> {
        self.alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Alert>, RepoError> {
        Ok(self.alerts.get(id).map(|a| a.clone()))
    }

    async fn find_by_status(
        &self,
        status: Option<AlertStatus>,
        page: PageRequest,
    ) -> Result<Page<Alert>, RepoError> {
        let mut matching: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .map(|a| a.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.created_at_ms
                .cmp(&a.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.size as usize)
            .collect();

        Ok(Page {
            items,
            page: page.page,
            size: page.size,
            total,
        })
    }

    async fn find_by_status_after(
        &self,
        status: AlertStatus,
        after: Option<&AlertCursor>,
        limit: usize,
    ) -> Result<Vec<Alert>, RepoError> {
        let mut matching: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.status == status && after.map_or(true, |c| c.precedes(a)))
            .map(|a| a.value().clone())
            .collect();
        matching.sort_by(|a, b| (a.created_at_ms, &a.id).cmp(&(b.created_at_ms, &b.id)));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn replace_if_version(
        &self,
        alert: &Alert,
        expected_version: u64,
    ) -> Result<bool, RepoError> {
        match self.alerts.get_mut(&alert.id) {
            Some(mut current) if current.version == expected_version => {
                *current = alert.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_by_status(&self) -> Result<StatusCounts, RepoError> {
        let mut counts = StatusCounts::default();
        for a in self.alerts.iter() {
            counts.add(a.status, 1);
        }
        Ok(counts)
    }
}

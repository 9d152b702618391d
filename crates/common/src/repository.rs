//! Persistence seams consumed by the alert store, delivery tracker and dispatch
//! engine. Implementations only need single-row atomicity.

use async_trait::async_trait;
use serde::Serialize;

use crate::model::{Alert, AlertConfiguration, AlertStatus, AlertType, NotificationDelivery};

#[derive(Debug)]
pub enum RepoError {
    Backend(String),
    Serialization(String),
    Corrupt(String),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "backend: {e}"),
            Self::Serialization(e) => write!(f, "serialization: {e}"),
            Self::Corrupt(e) => write!(f, "corrupt record: {e}"),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Position in `(created_at_ms, id)` order. Unlike an offset it does not
/// move when rows before it change status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertCursor {
    pub created_at_ms: i64,
    pub id: String,
}

impl AlertCursor {
    pub fn after(alert: &Alert) -> Self {
        Self {
            created_at_ms: alert.created_at_ms,
            id: alert.id.clone(),
        }
    }

    pub fn precedes(&self, alert: &Alert) -> bool {
        (self.created_at_ms, self.id.as_str()) < (alert.created_at_ms, alert.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: u64,
    pub acknowledged: u64,
    pub resolved: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.new + self.acknowledged + self.resolved
    }

    pub fn active(&self) -> u64 {
        self.new + self.acknowledged
    }

    pub fn add(&mut self, status: AlertStatus, count: u64) {
        match status {
            AlertStatus::New => self.new += count,
            AlertStatus::Acknowledged => self.acknowledged += count,
            AlertStatus::Resolved => self.resolved += count,
        }
    }
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn save(&self, alert: &Alert) -> Result<(), RepoError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Alert>, RepoError>;

    /// Newest first. `None` lists every status.
    async fn find_by_status(
        &self,
        status: Option<AlertStatus>,
        page: PageRequest,
    ) -> Result<Page<Alert>, RepoError>;

    /// Oldest first, starting strictly after `after`.
    async fn find_by_status_after(
        &self,
        status: AlertStatus,
        after: Option<&AlertCursor>,
        limit: usize,
    ) -> Result<Vec<Alert>, RepoError>;

    /// Writes `alert` only if the stored row still carries `expected_version`.
    async fn replace_if_version(
        &self,
        alert: &Alert,
        expected_version: u64,
    ) -> Result<bool, RepoError>;

    async fn count_by_status(&self) -> Result<StatusCounts, RepoError>;
}

#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    async fn save(&self, configuration: &AlertConfiguration) -> Result<(), RepoError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<AlertConfiguration>, RepoError>;

    async fn find_all(&self) -> Result<Vec<AlertConfiguration>, RepoError>;

    async fn find_by_type_and_enabled(
        &self,
        alert_type: AlertType,
    ) -> Result<Vec<AlertConfiguration>, RepoError>;

    async fn delete(&self, id: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn save(&self, delivery: &NotificationDelivery) -> Result<(), RepoError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationDelivery>, RepoError>;

    async fn find_by_alert(&self, alert_id: &str) -> Result<Vec<NotificationDelivery>, RepoError>;

    /// PENDING_RETRY records whose `next_retry_at_ms <= now_ms`, oldest first.
    async fn find_retry_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError>;

    /// Atomically moves a due record PENDING_RETRY -> PENDING and bumps its
    /// attempt. `None` means another worker already holds it.
    async fn claim_for_retry(
        &self,
        id: &str,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError>;

    /// PENDING records last touched before `cutoff_ms`, oldest first. These
    /// are attempts whose outcome was never recorded.
    async fn find_stale_pending(
        &self,
        cutoff_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationDelivery>, RepoError>;

    /// Atomically takes over a PENDING record still older than `cutoff_ms`
    /// by stamping it with `now_ms`. `None` means it was recorded or already
    /// taken over.
    async fn reclaim_stale(
        &self,
        id: &str,
        cutoff_ms: i64,
        now_ms: i64,
    ) -> Result<Option<NotificationDelivery>, RepoError>;

    /// Removes SENT/EXHAUSTED records last touched before `cutoff_ms`.
    async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, RepoError>;
}

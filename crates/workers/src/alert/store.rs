use std::sync::Arc;

use riskwatch_common::model::{Alert, AlertStatus, NewAlert, ResolutionType};
use riskwatch_common::repository::{
    AlertCursor, AlertRepository, Page, PageRequest, RepoError, StatusCounts,
};

/// Upper bound on optimistic write attempts for one transition.
const MAX_CAS_ATTEMPTS: usize = 8;

#[derive(Debug)]
pub enum AlertError {
    NotFound(String),
    Validation(String),
    Conflict(String),
    Repository(RepoError),
}

impl std::fmt::Display for AlertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "alert not found: {id}"),
            Self::Validation(msg) => write!(f, "invalid alert: {msg}"),
            Self::Conflict(id) => write!(f, "alert {id} kept changing, giving up"),
            Self::Repository(e) => write!(f, "repository: {e}"),
        }
    }
}

impl std::error::Error for AlertError {}

impl From<RepoError> for AlertError {
    fn from(e: RepoError) -> Self {
        Self::Repository(e)
    }
}

/// Outcome of an acknowledge/resolve/escalate call. `changed` is false when
/// the alert was already at or past the requested state.
#[derive(Debug, Clone)]
pub struct Transitioned {
    pub alert: Alert,
    pub changed: bool,
}

#[derive(Clone)]
pub struct AlertStore {
    repo: Arc<dyn AlertRepository>,
}

impl AlertStore {
    pub fn new(repo: Arc<dyn AlertRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, new_alert: NewAlert, now_ms: i64) -> Result<Alert, AlertError> {
        if new_alert.title.trim().is_empty() {
            return Err(AlertError::Validation("title must not be empty".into()));
        }
        let alert = new_alert.into_alert(uuid::Uuid::new_v4().to_string(), now_ms);
        self.repo.save(&alert).await?;
        tracing::info!(
            alert_id = %alert.id,
            alert_type = alert.alert_type.as_str(),
            severity = alert.severity.as_str(),
            "alert created"
        );
        Ok(alert)
    }

    pub async fn get(&self, id: &str) -> Result<Alert, AlertError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AlertError::NotFound(id.to_string()))
    }

    pub async fn list(
        &self,
        status: Option<AlertStatus>,
        page: PageRequest,
    ) -> Result<Page<Alert>, AlertError> {
        Ok(self.repo.find_by_status(status, page).await?)
    }

    /// One keyset page of alerts in `status`, oldest first.
    pub async fn list_after(
        &self,
        status: AlertStatus,
        after: Option<&AlertCursor>,
        limit: usize,
    ) -> Result<Vec<Alert>, AlertError> {
        Ok(self.repo.find_by_status_after(status, after, limit).await?)
    }

    pub async fn stats(&self) -> Result<StatusCounts, AlertError> {
        Ok(self.repo.count_by_status().await?)
    }

    pub async fn acknowledge(
        &self,
        id: &str,
        by: &str,
        note: Option<String>,
        now_ms: i64,
    ) -> Result<Transitioned, AlertError> {
        let t = self
            .modify(id, now_ms, |a| a.acknowledge(by, note.clone(), now_ms))
            .await?;
        if t.changed {
            tracing::info!(alert_id = id, by, "alert acknowledged");
        }
        Ok(t)
    }

    pub async fn resolve(
        &self,
        id: &str,
        by: &str,
        note: Option<String>,
        resolution_type: ResolutionType,
        now_ms: i64,
    ) -> Result<Transitioned, AlertError> {
        let t = self
            .modify(id, now_ms, |a| a.resolve(by, note.clone(), resolution_type, now_ms))
            .await?;
        if t.changed {
            tracing::info!(alert_id = id, by, ?resolution_type, "alert resolved");
        }
        Ok(t)
    }

    /// Claims the escalation slot of one configuration. Only the caller that
    /// gets `changed == true` may send the escalation notices.
    pub async fn mark_escalated(
        &self,
        id: &str,
        configuration_id: &str,
        now_ms: i64,
    ) -> Result<Transitioned, AlertError> {
        self.modify(id, now_ms, |a| a.mark_escalated(configuration_id))
            .await
    }

    async fn modify<F>(&self, id: &str, now_ms: i64, mut apply: F) -> Result<Transitioned, AlertError>
    where
        F: FnMut(&mut Alert) -> bool,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self.get(id).await?;
            let mut next = current.clone();
            if !apply(&mut next) {
                return Ok(Transitioned {
                    alert: current,
                    changed: false,
                });
            }
            next.version = current.version + 1;
            next.updated_at_ms = now_ms;
            if self.repo.replace_if_version(&next, current.version).await? {
                return Ok(Transitioned {
                    alert: next,
                    changed: true,
                });
            }
            tracing::debug!(alert_id = id, version = current.version, "concurrent update, retrying");
        }
        Err(AlertError::Conflict(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAlertRepository;
    use async_trait::async_trait;
    use riskwatch_common::model::{AlertType, Severity};

    fn store() -> AlertStore {
        AlertStore::new(Arc::new(MemoryAlertRepository::new()))
    }

    fn new_alert() -> NewAlert {
        NewAlert::new("Supplier delay", AlertType::Risk, Severity::Critical)
    }

    #[tokio::test]
    async fn create_assigns_id_and_new_status() {
        let s = store();
        let a = s.create(new_alert(), 1_000).await.unwrap();
        assert!(!a.id.is_empty());
        assert_eq!(a.status, AlertStatus::New);
        assert_eq!(s.get(&a.id).await.unwrap().created_at_ms, 1_000);
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let err = store()
            .create(NewAlert::new("  ", AlertType::Risk, Severity::Low), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AlertError::Validation(_)));
    }

    #[tokio::test]
    async fn acknowledge_is_idempotent() {
        let s = store();
        let a = s.create(new_alert(), 0).await.unwrap();

        let first = s.acknowledge(&a.id, "alice", None, 10).await.unwrap();
        assert!(first.changed);
        let second = s.acknowledge(&a.id, "bob", None, 20).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.alert.acknowledged_at_ms(), Some(10));
        assert_eq!(second.alert.version, 1);
    }

    #[tokio::test]
    async fn resolve_resolved_returns_existing() {
        let s = store();
        let a = s.create(new_alert(), 0).await.unwrap();
        s.resolve(&a.id, "alice", None, ResolutionType::Fixed, 10)
            .await
            .unwrap();
        let again = s
            .resolve(&a.id, "bob", Some("dup".into()), ResolutionType::Duplicate, 20)
            .await
            .unwrap();
        assert!(!again.changed);
        assert_eq!(again.alert.resolved_at_ms(), Some(10));
        assert_eq!(
            again.alert.resolution.unwrap().resolution_type,
            ResolutionType::Fixed
        );
    }

    #[tokio::test]
    async fn missing_alert_is_not_found() {
        let err = store().acknowledge("nope", "alice", None, 0).await.unwrap_err();
        assert!(matches!(err, AlertError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acknowledge_changes_once() {
        let s = store();
        let a = s.create(new_alert(), 0).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let s = s.clone();
            let id = a.id.clone();
            handles.push(tokio::spawn(async move {
                s.acknowledge(&id, &format!("user-{i}"), None, 100 + i).await
            }));
        }

        let mut changed = 0;
        for h in handles {
            if let Ok(t) = h.await.unwrap() {
                if t.changed {
                    changed += 1;
                }
            }
        }
        assert_eq!(changed, 1);
        assert_eq!(s.get(&a.id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn mark_escalated_once() {
        let s = store();
        let a = s.create(new_alert(), 0).await.unwrap();
        assert!(s.mark_escalated(&a.id, "cfg-1", 5).await.unwrap().changed);
        assert!(!s.mark_escalated(&a.id, "cfg-1", 6).await.unwrap().changed);
    }

    struct AlwaysStale(MemoryAlertRepository);

    #[async_trait]
    impl AlertRepository for AlwaysStale {
        async fn save(&self, alert: &Alert) -> Result<(), RepoError> {
            self.0.save(alert).await
        }
        async fn find_by_id(&self, id: &str) -> Result<Option<Alert>, RepoError> {
            self.0.find_by_id(id).await
        }
        async fn find_by_status(
            &self,
            status: Option<AlertStatus>,
            page: PageRequest,
        ) -> Result<Page<Alert>, RepoError> {
            self.0.find_by_status(status, page).await
        }
        async fn find_by_status_after(
            &self,
            status: AlertStatus,
            after: Option<&AlertCursor>,
            limit: usize,
        ) -> Result<Vec<Alert>, RepoError> {
            self.0.find_by_status_after(status, after, limit).await
        }
        async fn replace_if_version(&self, _: &Alert, _: u64) -> Result<bool, RepoError> {
            Ok(false)
        }
        async fn count_by_status(&self) -> Result<StatusCounts, RepoError> {
            self.0.count_by_status().await
        }
    }

    #[tokio::test]
    async fn gives_up_after_repeated_conflicts() {
        let s = AlertStore::new(Arc::new(AlwaysStale(MemoryAlertRepository::new())));
        let a = s.create(new_alert(), 0).await.unwrap();
        let err = s.acknowledge(&a.id, "alice", None, 1).await.unwrap_err();
        assert!(matches!(err, AlertError::Conflict(_)));
    }
}

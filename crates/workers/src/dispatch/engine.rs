use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use riskwatch_common::model::{
    Alert, AlertConfiguration, AlertStatus, Channel, ChannelTarget, DeliveryDraft, DeliveryStatus,
    NotificationDelivery, Tier,
};
use riskwatch_common::repository::{AlertCursor, ConfigurationRepository, RepoError};

use crate::alert::{AlertError, AlertStore};
use crate::delivery::DeliveryTracker;
use crate::health::{ChannelHealth, ChannelStatus};
use crate::metrics::dispatch_metrics::DispatchMetrics;
use crate::notifier::{render, NotifierRegistry, NotifyError, RenderedContent};

const ESCALATION_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub worker_pool_size: usize,
    pub send_timeout: Duration,
    pub backoff_ceiling: Duration,
    pub retry_batch_size: usize,
    /// A PENDING record untouched for this long lost its sender and is
    /// recorded as a transient failure by the next retry sweep.
    pub stale_pending_after: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 16,
            send_timeout: Duration::from_secs(10),
            backoff_ceiling: Duration::from_secs(3_600),
            retry_batch_size: 100,
            stale_pending_after: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
pub enum DispatchError {
    Alert(AlertError),
    Repository(RepoError),
    PoolClosed,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert(e) => write!(f, "alert: {e}"),
            Self::Repository(e) => write!(f, "repository: {e}"),
            Self::PoolClosed => write!(f, "send pool closed"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<AlertError> for DispatchError {
    fn from(e: AlertError) -> Self {
        Self::Alert(e)
    }
}

impl From<RepoError> for DispatchError {
    fn from(e: RepoError) -> Self {
        Self::Repository(e)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub deliveries: usize,
    pub sent: usize,
    pub retry_scheduled: usize,
    pub exhausted: usize,
    pub errors: usize,
}

impl DispatchReport {
    fn tally(&mut self, outcome: &Result<NotificationDelivery, DispatchError>) {
        self.deliveries += 1;
        match outcome {
            Ok(d) => match d.status {
                DeliveryStatus::Sent => self.sent += 1,
                DeliveryStatus::PendingRetry => self.retry_scheduled += 1,
                DeliveryStatus::Exhausted => self.exhausted += 1,
                _ => {}
            },
            Err(_) => self.errors += 1,
        }
    }

    fn merge(&mut self, other: DispatchReport) {
        self.deliveries += other.deliveries;
        self.sent += other.sent;
        self.retry_scheduled += other.retry_scheduled;
        self.exhausted += other.exhausted;
        self.errors += other.errors;
    }
}

/// Result of one retry or escalation sweep. `examined` counts candidates,
/// `skipped` those another worker or an earlier acknowledgment got to first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub skipped: usize,
    /// Interrupted PENDING attempts turned into transient failures.
    pub recovered: usize,
    pub deliveries: DispatchReport,
}

#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<Inner>,
}

struct Inner {
    alerts: AlertStore,
    configurations: Arc<dyn ConfigurationRepository>,
    tracker: DeliveryTracker,
    notifiers: NotifierRegistry,
    health: ChannelHealth,
    metrics: Arc<DispatchMetrics>,
    permits: Semaphore,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(
        alerts: AlertStore,
        configurations: Arc<dyn ConfigurationRepository>,
        tracker: DeliveryTracker,
        notifiers: NotifierRegistry,
        config: DispatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                alerts,
                configurations,
                tracker,
                notifiers,
                health: ChannelHealth::new(),
                metrics: DispatchMetrics::new(),
                permits: Semaphore::new(config.worker_pool_size.max(1)),
                config,
            }),
        }
    }

    pub fn alerts(&self) -> &AlertStore {
        &self.inner.alerts
    }

    pub fn tracker(&self) -> &DeliveryTracker {
        &self.inner.tracker
    }

    pub fn health(&self) -> &ChannelHealth {
        &self.inner.health
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.inner.metrics
    }

    /// Sends the primary tier of every enabled configuration matching the
    /// alert. Individual send failures are recorded, never returned.
    pub async fn dispatch(&self, alert: &Alert, now_ms: i64) -> Result<DispatchReport, DispatchError> {
        let configurations: Vec<AlertConfiguration> = self
            .inner
            .configurations
            .find_by_type_and_enabled(alert.alert_type)
            .await?
            .into_iter()
            .filter(|c| c.matches(alert))
            .collect();

        let drafts: Vec<DeliveryDraft> = configurations
            .iter()
            .flat_map(|c| drafts_for(alert, c, &c.channels, Tier::Primary))
            .collect();

        let report = self.fan_out(alert, Tier::Primary, drafts, now_ms).await;
        self.inner.metrics.inc_alerts_dispatched();
        tracing::info!(
            alert_id = %alert.id,
            configurations = configurations.len(),
            deliveries = report.deliveries,
            sent = report.sent,
            retry_scheduled = report.retry_scheduled,
            exhausted = report.exhausted,
            "alert dispatched"
        );
        Ok(report)
    }

    /// Sends the escalation tier of one configuration, at most once per
    /// (alert, configuration) and only while the alert is still NEW.
    pub async fn escalate(
        &self,
        alert: &Alert,
        configuration: &AlertConfiguration,
        now_ms: i64,
    ) -> Result<Option<DispatchReport>, DispatchError> {
        let Some(tier) = &configuration.escalation else {
            return Ok(None);
        };

        let claimed = self
            .inner
            .alerts
            .mark_escalated(&alert.id, &configuration.id, now_ms)
            .await?;
        if !claimed.changed {
            return Ok(None);
        }

        let drafts = drafts_for(&claimed.alert, configuration, &tier.targets, Tier::Escalation);
        let report = self
            .fan_out(&claimed.alert, Tier::Escalation, drafts, now_ms)
            .await;
        self.inner.metrics.inc_escalations();
        tracing::info!(
            alert_id = %alert.id,
            configuration_id = %configuration.id,
            deliveries = report.deliveries,
            "alert escalated"
        );
        Ok(Some(report))
    }

    /// Replays every delivery whose backoff has elapsed. A record is claimed
    /// before it is sent so concurrent sweeps never double-send an attempt.
    /// Interrupted PENDING attempts are recovered first so they become due.
    pub async fn retry_sweep(&self, now_ms: i64) -> Result<SweepReport, DispatchError> {
        let recovered = self.recover_stale(now_ms).await?;

        let due = self
            .inner
            .tracker
            .due_for_retry(now_ms, self.inner.config.retry_batch_size)
            .await?;

        let outcomes = join_all(due.iter().map(|d| self.replay(&d.id, now_ms))).await;

        let mut report = SweepReport {
            examined: due.len(),
            recovered,
            ..SweepReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(Some(result)) => report.deliveries.tally(&result),
                Ok(None) => report.skipped += 1,
                Err(e) => report.deliveries.tally(&Err(e)),
            }
        }
        if report.examined > 0 || report.recovered > 0 {
            tracing::info!(
                examined = report.examined,
                recovered = report.recovered,
                skipped = report.skipped,
                sent = report.deliveries.sent,
                retry_scheduled = report.deliveries.retry_scheduled,
                exhausted = report.deliveries.exhausted,
                "retry sweep finished"
            );
        }
        Ok(report)
    }

    /// Records a transient failure for every PENDING delivery older than
    /// `stale_pending_after`, so it is retried or exhausted like any other
    /// failed attempt.
    async fn recover_stale(&self, now_ms: i64) -> Result<usize, DispatchError> {
        let after = i64::try_from(self.inner.config.stale_pending_after.as_millis())
            .unwrap_or(i64::MAX);
        let cutoff_ms = now_ms.saturating_sub(after);
        let stale = self
            .inner
            .tracker
            .stale_pending(cutoff_ms, self.inner.config.retry_batch_size)
            .await?;

        let mut recovered = 0;
        for candidate in stale {
            let Some(delivery) = self
                .inner
                .tracker
                .reclaim_stale(&candidate.id, cutoff_ms, now_ms)
                .await?
            else {
                continue;
            };
            tracing::warn!(
                delivery_id = %delivery.id,
                alert_id = %delivery.alert_id,
                channel = %delivery.channel,
                attempt = delivery.attempt,
                "recovering delivery attempt with no recorded outcome"
            );
            let interrupted = Err(NotifyError::transient(
                "attempt interrupted before its outcome was recorded",
            ));
            let recorded = self.inner.tracker.record(delivery, &interrupted, now_ms).await?;
            self.observe(&recorded);
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn replay(
        &self,
        delivery_id: &str,
        now_ms: i64,
    ) -> Result<Option<Result<NotificationDelivery, DispatchError>>, DispatchError> {
        let Some(delivery) = self.inner.tracker.claim(delivery_id, now_ms).await? else {
            return Ok(None);
        };
        self.inner.metrics.inc_retries_claimed();

        let content = match self.inner.alerts.get(&delivery.alert_id).await {
            Ok(alert) => render(&alert, delivery.tier),
            Err(AlertError::NotFound(_)) => {
                let gone = Err(NotifyError::permanent("alert no longer exists"));
                let recorded = self.inner.tracker.record(delivery, &gone, now_ms).await?;
                self.observe(&recorded);
                return Ok(Some(Ok(recorded)));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(self.attempt(delivery, Arc::new(content), now_ms).await))
    }

    /// Escalates every NEW alert whose configuration deadline has passed.
    pub async fn escalation_sweep(&self, now_ms: i64) -> Result<SweepReport, DispatchError> {
        let escalating: Vec<AlertConfiguration> = self
            .inner
            .configurations
            .find_all()
            .await?
            .into_iter()
            .filter(|c| c.enabled && c.escalation.is_some())
            .collect();

        let mut report = SweepReport::default();
        if escalating.is_empty() {
            return Ok(report);
        }

        for alert in self.unacknowledged_alerts().await? {
            for configuration in &escalating {
                let Some(tier) = &configuration.escalation else {
                    continue;
                };
                if !configuration.matches(&alert)
                    || !alert.escalation_due(tier.deadline_ms, now_ms)
                    || alert.is_escalated_by(&configuration.id)
                {
                    continue;
                }
                report.examined += 1;
                match self.escalate(&alert, configuration, now_ms).await {
                    Ok(Some(r)) => report.deliveries.merge(r),
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        report.deliveries.errors += 1;
                        tracing::error!(
                            alert_id = %alert.id,
                            configuration_id = %configuration.id,
                            error = %e,
                            "escalation failed"
                        );
                    }
                }
            }
        }
        Ok(report)
    }

    /// Walks NEW alerts by keyset so acknowledgements made during the walk
    /// cannot shift unvisited alerts out of reach.
    async fn unacknowledged_alerts(&self) -> Result<Vec<Alert>, DispatchError> {
        let mut all: Vec<Alert> = Vec::new();
        loop {
            let cursor = all.last().map(AlertCursor::after);
            let batch = self
                .inner
                .alerts
                .list_after(AlertStatus::New, cursor.as_ref(), ESCALATION_PAGE_SIZE)
                .await?;
            let fetched = batch.len();
            all.extend(batch);
            if fetched < ESCALATION_PAGE_SIZE {
                break;
            }
        }
        Ok(all)
    }

    /// Drops terminal delivery records last touched before `cutoff_ms`.
    pub async fn cleanup(&self, cutoff_ms: i64) -> Result<u64, DispatchError> {
        let purged = self.inner.tracker.purge_older_than(cutoff_ms).await?;
        self.inner.metrics.add_deliveries_purged(purged);
        tracing::info!(purged, cutoff_ms, "delivery retention sweep finished");
        Ok(purged)
    }

    /// Probes every registered transport and records reachability.
    pub async fn health_check(&self, now_ms: i64) -> Vec<ChannelStatus> {
        let timeout = self.inner.config.send_timeout;
        let probes = self.inner.notifiers.iter().map(|(channel, notifier)| async move {
            let result = match tokio::time::timeout(timeout, notifier.probe()).await {
                Ok(r) => r,
                Err(_) => Err(NotifyError::transient(format!("probe timed out after {timeout:?}"))),
            };
            if let Err(e) = &result {
                tracing::warn!(%channel, notifier = notifier.name(), error = %e, "channel unreachable");
            }
            self.inner.health.record(channel, notifier.name(), &result, now_ms)
        });
        join_all(probes).await
    }

    async fn fan_out(
        &self,
        alert: &Alert,
        tier: Tier,
        drafts: Vec<DeliveryDraft>,
        now_ms: i64,
    ) -> DispatchReport {
        let content = Arc::new(render(alert, tier));
        let outcomes = join_all(
            drafts
                .into_iter()
                .map(|draft| self.deliver_new(draft, content.clone(), now_ms)),
        )
        .await;

        let mut report = DispatchReport::default();
        for outcome in &outcomes {
            if let Err(e) = outcome {
                tracing::error!(alert_id = %alert.id, error = %e, "delivery could not be recorded");
            }
            report.tally(outcome);
        }
        report
    }

    async fn deliver_new(
        &self,
        draft: DeliveryDraft,
        content: Arc<RenderedContent>,
        now_ms: i64,
    ) -> Result<NotificationDelivery, DispatchError> {
        let delivery = self.inner.tracker.open(draft, now_ms).await?;
        self.attempt(delivery, content, now_ms).await
    }

    /// Sends one PENDING delivery and records the outcome while still holding
    /// the pool permit.
    async fn attempt(
        &self,
        delivery: NotificationDelivery,
        content: Arc<RenderedContent>,
        now_ms: i64,
    ) -> Result<NotificationDelivery, DispatchError> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchError::PoolClosed)?;

        let result = self
            .send(delivery.channel, &delivery.recipient, content)
            .await;
        let recorded = self.inner.tracker.record(delivery, &result, now_ms).await?;
        self.observe(&recorded);
        Ok(recorded)
    }

    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        content: Arc<RenderedContent>,
    ) -> Result<(), NotifyError> {
        let Some(notifier) = self.inner.notifiers.get(channel) else {
            return Err(NotifyError::permanent(format!(
                "no notifier registered for channel {channel}"
            )));
        };

        let timeout = self.inner.config.send_timeout;
        let name = notifier.name().to_string();
        let recipient = recipient.to_string();
        let started = Instant::now();

        // Own task so a panicking transport cannot take the fan-out down.
        let mut task = tokio::spawn(async move { notifier.send(&recipient, &content).await });
        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(NotifyError::transient(format!(
                "{name} sender aborted: {join_err}"
            ))),
            Err(_) => {
                task.abort();
                self.inner.metrics.inc_send_timeouts();
                Err(NotifyError::transient(format!(
                    "{name} send timed out after {timeout:?}"
                )))
            }
        };
        self.inner.metrics.record_send_latency(started);
        result
    }

    fn observe(&self, delivery: &NotificationDelivery) {
        let m = &self.inner.metrics;
        match delivery.status {
            DeliveryStatus::Sent => {
                m.inc_deliveries_sent();
                tracing::debug!(
                    delivery_id = %delivery.id,
                    alert_id = %delivery.alert_id,
                    channel = %delivery.channel,
                    attempt = delivery.attempt,
                    "delivery sent"
                );
            }
            DeliveryStatus::PendingRetry => {
                m.inc_deliveries_retry_scheduled();
                tracing::info!(
                    delivery_id = %delivery.id,
                    alert_id = %delivery.alert_id,
                    channel = %delivery.channel,
                    attempt = delivery.attempt,
                    next_retry_at_ms = delivery.next_retry_at_ms,
                    error = delivery.last_error.as_deref().unwrap_or_default(),
                    "delivery failed, retry scheduled"
                );
            }
            DeliveryStatus::Exhausted => m.inc_deliveries_exhausted(),
            _ => {}
        }
    }
}

fn drafts_for(
    alert: &Alert,
    configuration: &AlertConfiguration,
    targets: &[ChannelTarget],
    tier: Tier,
) -> Vec<DeliveryDraft> {
    targets
        .iter()
        .map(|t| DeliveryDraft {
            alert_id: alert.id.clone(),
            configuration_id: configuration.id.clone(),
            channel: t.channel,
            recipient: t.recipient.clone(),
            tier,
            retry: configuration.retry,
        })
        .collect()
}

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use riskwatch_common::model::{
    Alert, AlertConfiguration, AlertStatus, AlertType, Channel, ChannelTarget, DeliveryDraft,
    DeliveryStatus, EscalationTier, FailureKind, NewAlert, NotificationDelivery, RetryPolicy,
    Severity, Tier,
};
use riskwatch_common::repository::{
    AlertCursor, AlertRepository, ConfigurationRepository, Page, PageRequest, RepoError,
    StatusCounts,
};

use riskwatch_workers::alert::AlertStore;
use riskwatch_workers::delivery::DeliveryTracker;
use riskwatch_workers::dispatch::{DispatchConfig, DispatchEngine};
use riskwatch_workers::notifier::{Notifier, NotifierRegistry, NotifyError, RenderedContent};
use riskwatch_workers::store::{
    MemoryAlertRepository, MemoryConfigurationRepository, MemoryDeliveryRepository,
};

const MINUTE: i64 = 60_000;
const STALE_AFTER: i64 = 10 * MINUTE;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Transient,
    Permanent,
    Hang,
    Panic,
}

struct ScriptedNotifier {
    channel: Channel,
    script: Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    sends: AtomicUsize,
    subjects: Mutex<Vec<String>>,
}

impl ScriptedNotifier {
    fn new(channel: Channel, fallback: Behavior) -> Arc<Self> {
        Self::scripted(channel, Vec::new(), fallback)
    }

    fn scripted(channel: Channel, script: Vec<Behavior>, fallback: Behavior) -> Arc<Self> {
        Arc::new(Self {
            channel,
            script: Mutex::new(script.into()),
            fallback,
            sends: AtomicUsize::new(0),
            subjects: Mutex::new(Vec::new()),
        })
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for ScriptedNotifier {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, _recipient: &str, content: &RenderedContent) -> Result<(), NotifyError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().unwrap().push(content.subject.clone());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match next {
            Behavior::Succeed => Ok(()),
            Behavior::Transient => Err(NotifyError::transient("gateway unavailable")),
            Behavior::Permanent => Err(NotifyError::permanent("invalid recipient")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(())
            }
            Behavior::Panic => panic!("transport bug"),
        }
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        match self.fallback {
            Behavior::Succeed => Ok(()),
            _ => Err(NotifyError::transient("unreachable")),
        }
    }
}

struct Harness {
    engine: DispatchEngine,
    configurations: MemoryConfigurationRepository,
}

fn harness(notifiers: Vec<Arc<ScriptedNotifier>>) -> Harness {
    let configurations = MemoryConfigurationRepository::new();
    let mut registry = NotifierRegistry::new();
    for n in notifiers {
        registry.register(n);
    }
    let config = DispatchConfig {
        worker_pool_size: 4,
        send_timeout: Duration::from_millis(50),
        backoff_ceiling: Duration::from_secs(3_600),
        retry_batch_size: 100,
        stale_pending_after: Duration::from_millis(STALE_AFTER as u64),
    };
    let engine = DispatchEngine::new(
        AlertStore::new(Arc::new(MemoryAlertRepository::new())),
        Arc::new(configurations.clone()),
        DeliveryTracker::new(Arc::new(MemoryDeliveryRepository::new()), config.backoff_ceiling),
        registry,
        config,
    );
    Harness {
        engine,
        configurations,
    }
}

fn configuration(channels: Vec<ChannelTarget>) -> AlertConfiguration {
    AlertConfiguration {
        id: "cfg-risk".into(),
        name: "risk alerts to ops".into(),
        description: None,
        alert_type: AlertType::Risk,
        enabled: true,
        min_severity: None,
        channels,
        escalation: None,
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: MINUTE as u64,
        },
        created_at_ms: 0,
        updated_at_ms: 0,
    }
}

fn email_and_chat() -> Vec<ChannelTarget> {
    vec![
        ChannelTarget::new(Channel::Email, "ops@example.com"),
        ChannelTarget::new(Channel::Chat, "#risk"),
    ]
}

impl Harness {
    async fn add(&self, c: AlertConfiguration) {
        self.configurations.save(&c).await.unwrap();
    }

    async fn create(&self, severity: Severity, now_ms: i64) -> Alert {
        self.engine
            .alerts()
            .create(NewAlert::new("Supplier default risk", AlertType::Risk, severity), now_ms)
            .await
            .unwrap()
    }

    async fn deliveries(&self, alert_id: &str) -> Vec<NotificationDelivery> {
        self.engine.tracker().for_alert(alert_id).await.unwrap()
    }

    async fn delivery(&self, alert_id: &str, channel: Channel) -> NotificationDelivery {
        self.deliveries(alert_id)
            .await
            .into_iter()
            .find(|d| d.channel == channel)
            .unwrap()
    }
}

#[tokio::test]
async fn both_channels_succeed() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Succeed);
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![email.clone(), chat.clone()]);
    h.add(configuration(email_and_chat())).await;

    let alert = h.create(Severity::Critical, 0).await;
    let report = h.engine.dispatch(&alert, 0).await.unwrap();

    assert_eq!(report.deliveries, 2);
    assert_eq!(report.sent, 2);
    let deliveries = h.deliveries(&alert.id).await;
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().all(|d| d.status == DeliveryStatus::Sent));
    assert_eq!(
        h.engine.alerts().get(&alert.id).await.unwrap().status,
        AlertStatus::New
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_email_is_retried_until_sent() {
    let email = ScriptedNotifier::scripted(Channel::Email, vec![Behavior::Hang], Behavior::Succeed);
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![email.clone(), chat.clone()]);
    h.add(configuration(email_and_chat())).await;

    let alert = h.create(Severity::Critical, 0).await;
    let report = h.engine.dispatch(&alert, 0).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.retry_scheduled, 1);

    assert_eq!(h.delivery(&alert.id, Channel::Chat).await.status, DeliveryStatus::Sent);
    let pending = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(pending.status, DeliveryStatus::PendingRetry);
    assert_eq!(pending.failure, Some(FailureKind::Transient));
    assert_eq!(pending.next_retry_at_ms, Some(MINUTE));
    assert_eq!(h.engine.metrics().send_timeouts_val(), 1);

    let early = h.engine.retry_sweep(MINUTE - 1).await.unwrap();
    assert_eq!(early.examined, 0);

    let sweep = h.engine.retry_sweep(MINUTE).await.unwrap();
    assert_eq!(sweep.deliveries.sent, 1);

    let sent = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(sent.status, DeliveryStatus::Sent);
    assert_eq!(sent.attempt, 2);
    assert_eq!(email.sends(), 2);
    assert_eq!(chat.sends(), 1);
}

#[tokio::test]
async fn failing_channel_does_not_block_others() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Permanent);
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![email, chat]);
    h.add(configuration(email_and_chat())).await;

    let alert = h.create(Severity::High, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();

    assert_eq!(h.delivery(&alert.id, Channel::Chat).await.status, DeliveryStatus::Sent);
    let email = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(email.status, DeliveryStatus::Exhausted);
    assert_eq!(email.failure, Some(FailureKind::Permanent));
    assert!(h.engine.retry_sweep(i64::MAX).await.unwrap().examined == 0);
}

#[tokio::test]
async fn panicking_sender_is_isolated() {
    let email = ScriptedNotifier::scripted(Channel::Email, vec![Behavior::Panic], Behavior::Succeed);
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![email, chat]);
    h.add(configuration(email_and_chat())).await;

    let alert = h.create(Severity::High, 0).await;
    let report = h.engine.dispatch(&alert, 0).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.retry_scheduled, 1);
    assert_eq!(h.delivery(&alert.id, Channel::Chat).await.status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn transient_failures_stop_at_max_attempts() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Transient);
    let h = harness(vec![email.clone()]);
    h.add(configuration(vec![ChannelTarget::new(Channel::Email, "ops@example.com")]))
        .await;

    let alert = h.create(Severity::Critical, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();

    let mut previous = 0;
    for _ in 0..10 {
        let d = h.delivery(&alert.id, Channel::Email).await;
        let Some(at) = d.next_retry_at_ms else { break };
        assert!(at > previous);
        previous = at;
        h.engine.retry_sweep(at).await.unwrap();
    }

    let d = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(d.status, DeliveryStatus::Exhausted);
    assert_eq!(d.attempt, 3);
    assert_eq!(email.sends(), 3);
    assert_eq!(h.engine.retry_sweep(i64::MAX).await.unwrap().examined, 0);
    assert_eq!(email.sends(), 3);
}

#[tokio::test]
async fn unregistered_channel_is_exhausted() {
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![chat]);
    h.add(configuration(vec![
        ChannelTarget::new(Channel::Push, "device-1"),
        ChannelTarget::new(Channel::Chat, "#risk"),
    ]))
    .await;

    let alert = h.create(Severity::Low, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();

    let push = h.delivery(&alert.id, Channel::Push).await;
    assert_eq!(push.status, DeliveryStatus::Exhausted);
    assert!(push.last_error.unwrap().contains("no notifier"));
    assert_eq!(h.delivery(&alert.id, Channel::Chat).await.status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn non_matching_configurations_are_skipped() {
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![chat.clone()]);

    let mut disabled = configuration(vec![ChannelTarget::new(Channel::Chat, "#a")]);
    disabled.id = "disabled".into();
    disabled.enabled = false;
    h.add(disabled).await;

    let mut other_type = configuration(vec![ChannelTarget::new(Channel::Chat, "#b")]);
    other_type.id = "security".into();
    other_type.alert_type = AlertType::Security;
    h.add(other_type).await;

    let mut severe_only = configuration(vec![ChannelTarget::new(Channel::Chat, "#c")]);
    severe_only.id = "severe".into();
    severe_only.min_severity = Some(Severity::High);
    h.add(severe_only).await;

    let alert = h.create(Severity::Medium, 0).await;
    let report = h.engine.dispatch(&alert, 0).await.unwrap();
    assert_eq!(report.deliveries, 0);
    assert_eq!(chat.sends(), 0);
}

fn escalating_configuration() -> AlertConfiguration {
    let mut c = configuration(vec![ChannelTarget::new(Channel::Chat, "#risk")]);
    c.escalation = Some(EscalationTier {
        deadline_ms: 5 * MINUTE,
        targets: vec![ChannelTarget::new(Channel::Sms, "+15550100")],
    });
    c
}

#[tokio::test]
async fn unacknowledged_alert_escalates_once() {
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let sms = ScriptedNotifier::new(Channel::Sms, Behavior::Succeed);
    let h = harness(vec![chat, sms.clone()]);
    h.add(escalating_configuration()).await;

    let alert = h.create(Severity::Critical, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();

    let before = h.engine.escalation_sweep(4 * MINUTE).await.unwrap();
    assert_eq!(before.examined, 0);
    assert_eq!(sms.sends(), 0);

    let sweep = h.engine.escalation_sweep(6 * MINUTE).await.unwrap();
    assert_eq!(sweep.deliveries.sent, 1);
    assert_eq!(sms.sends(), 1);
    assert!(sms.subjects.lock().unwrap()[0].starts_with("[ESCALATED]"));

    let again = h.engine.escalation_sweep(20 * MINUTE).await.unwrap();
    assert_eq!(again.deliveries.deliveries, 0);
    assert_eq!(sms.sends(), 1);

    h.engine
        .alerts()
        .acknowledge(&alert.id, "alice", None, 21 * MINUTE)
        .await
        .unwrap();
    let escalated = h.delivery(&alert.id, Channel::Sms).await;
    assert_eq!(escalated.tier, Tier::Escalation);
    assert_eq!(escalated.status, DeliveryStatus::Sent);
    assert_eq!(h.deliveries(&alert.id).await.len(), 2);
}

#[tokio::test]
async fn acknowledgment_suppresses_escalation() {
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let sms = ScriptedNotifier::new(Channel::Sms, Behavior::Succeed);
    let h = harness(vec![chat, sms.clone()]);
    h.add(escalating_configuration()).await;

    let alert = h.create(Severity::Critical, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();
    h.engine
        .alerts()
        .acknowledge(&alert.id, "alice", Some("on it".into()), 2 * MINUTE)
        .await
        .unwrap();

    h.engine.escalation_sweep(10 * MINUTE).await.unwrap();
    assert_eq!(sms.sends(), 0);

    let stale_copy = alert.clone();
    let direct = h
        .engine
        .escalate(&stale_copy, &escalating_configuration(), 10 * MINUTE)
        .await
        .unwrap();
    assert!(direct.is_none());
    assert_eq!(sms.sends(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_retry_sweeps_send_each_attempt_once() {
    let email = ScriptedNotifier::scripted(Channel::Email, vec![Behavior::Transient], Behavior::Succeed);
    let h = harness(vec![email.clone()]);
    h.add(configuration(vec![ChannelTarget::new(Channel::Email, "ops@example.com")]))
        .await;

    let alert = h.create(Severity::Critical, 0).await;
    h.engine.dispatch(&alert, 0).await.unwrap();
    assert_eq!(email.sends(), 1);

    let a = h.engine.clone();
    let b = h.engine.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.retry_sweep(MINUTE).await }),
        tokio::spawn(async move { b.retry_sweep(MINUTE).await }),
    );
    let ra = ra.unwrap().unwrap();
    let rb = rb.unwrap().unwrap();

    assert_eq!(email.sends(), 2);
    assert_eq!(ra.deliveries.sent + rb.deliveries.sent, 1);
    let d = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(d.status, DeliveryStatus::Sent);
    assert_eq!(d.attempt, 2);
}

#[tokio::test]
async fn cleanup_purges_old_terminal_deliveries() {
    let chat = ScriptedNotifier::new(Channel::Chat, Behavior::Succeed);
    let h = harness(vec![chat]);
    h.add(configuration(vec![ChannelTarget::new(Channel::Chat, "#risk")]))
        .await;

    let old = h.create(Severity::High, 0).await;
    h.engine.dispatch(&old, 0).await.unwrap();
    let recent = h.create(Severity::High, 40 * 24 * 60 * MINUTE).await;
    h.engine.dispatch(&recent, 40 * 24 * 60 * MINUTE).await.unwrap();

    let purged = h.engine.cleanup(10 * 24 * 60 * MINUTE).await.unwrap();
    assert_eq!(purged, 1);
    assert!(h.deliveries(&old.id).await.is_empty());
    assert_eq!(h.deliveries(&recent.id).await.len(), 1);
}

#[tokio::test]
async fn health_check_records_every_channel() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Succeed);
    let sms = ScriptedNotifier::new(Channel::Sms, Behavior::Transient);
    let h = harness(vec![email, sms]);

    let statuses = h.engine.health_check(1_000).await;
    assert_eq!(statuses.len(), 2);
    assert!(h.engine.health().get(Channel::Email).unwrap().reachable);
    let sms = h.engine.health().get(Channel::Sms).unwrap();
    assert!(!sms.reachable);
    assert_eq!(sms.checked_at_ms, 1_000);
}

fn email_draft(alert: &Alert, max_attempts: u32) -> DeliveryDraft {
    DeliveryDraft {
        alert_id: alert.id.clone(),
        configuration_id: "cfg-risk".into(),
        channel: Channel::Email,
        recipient: "ops@example.com".into(),
        tier: Tier::Primary,
        retry: RetryPolicy {
            max_attempts,
            backoff_base_ms: MINUTE as u64,
        },
    }
}

#[tokio::test]
async fn interrupted_attempt_is_recovered_and_retried() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Succeed);
    let h = harness(vec![email.clone()]);
    let alert = h.create(Severity::Critical, 0).await;

    // Opened but never recorded, as if the process stopped mid-send.
    let stuck = h.engine.tracker().open(email_draft(&alert, 3), 0).await.unwrap();

    let early = h.engine.retry_sweep(STALE_AFTER).await.unwrap();
    assert_eq!(early.recovered, 0);
    assert_eq!(h.delivery(&alert.id, Channel::Email).await.status, DeliveryStatus::Pending);

    let now = STALE_AFTER + 1;
    let sweep = h.engine.retry_sweep(now).await.unwrap();
    assert_eq!(sweep.recovered, 1);
    assert_eq!(sweep.examined, 0);

    let recovered = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(recovered.id, stuck.id);
    assert_eq!(recovered.status, DeliveryStatus::PendingRetry);
    assert_eq!(recovered.failure, Some(FailureKind::Transient));
    assert_eq!(recovered.next_retry_at_ms, Some(now + MINUTE));
    assert!(recovered.last_error.unwrap().contains("interrupted"));
    assert_eq!(email.sends(), 0);

    let replay = h.engine.retry_sweep(now + MINUTE).await.unwrap();
    assert_eq!(replay.recovered, 0);
    assert_eq!(replay.deliveries.sent, 1);
    let sent = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(sent.status, DeliveryStatus::Sent);
    assert_eq!(sent.attempt, 2);
    assert_eq!(email.sends(), 1);
}

#[tokio::test]
async fn interrupted_last_attempt_is_exhausted() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Succeed);
    let h = harness(vec![email.clone()]);
    let alert = h.create(Severity::Critical, 0).await;
    h.engine.tracker().open(email_draft(&alert, 1), 0).await.unwrap();

    let sweep = h.engine.retry_sweep(STALE_AFTER + 1).await.unwrap();
    assert_eq!(sweep.recovered, 1);
    let d = h.delivery(&alert.id, Channel::Email).await;
    assert_eq!(d.status, DeliveryStatus::Exhausted);
    assert_eq!(h.engine.retry_sweep(i64::MAX).await.unwrap().recovered, 0);
    assert_eq!(email.sends(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sweeps_recover_each_interrupted_attempt_once() {
    let email = ScriptedNotifier::new(Channel::Email, Behavior::Succeed);
    let h = harness(vec![email]);
    let alert = h.create(Severity::Critical, 0).await;
    for _ in 0..20 {
        h.engine.tracker().open(email_draft(&alert, 3), 0).await.unwrap();
    }

    let now = STALE_AFTER + 1;
    let (a, b) = (h.engine.clone(), h.engine.clone());
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.retry_sweep(now).await }),
        tokio::spawn(async move { b.retry_sweep(now).await }),
    );
    let total = ra.unwrap().unwrap().recovered + rb.unwrap().unwrap().recovered;
    assert_eq!(total, 20);
    assert_eq!(h.engine.metrics().deliveries_retry_scheduled_val(), 20);
}

/// Operators acknowledge every alert in the first page handed to the
/// escalation walk, before the walk asks for the next page.
struct AcknowledgedMidWalk {
    inner: MemoryAlertRepository,
    done: AtomicBool,
}

#[async_trait]
impl AlertRepository for AcknowledgedMidWalk {
    async fn save(&self, alert: &Alert) -> Result<(), RepoError> {
        self.inner.save(alert).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Alert>, RepoError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_status(
        &self,
        status: Option<AlertStatus>,
        page: PageRequest,
    ) -> Result<Page<Alert>, RepoError> {
        self.inner.find_by_status(status, page).await
    }

    async fn find_by_status_after(
        &self,
        status: AlertStatus,
        after: Option<&AlertCursor>,
        limit: usize,
    ) -> Result<Vec<Alert>, RepoError> {
        let batch = self.inner.find_by_status_after(status, after, limit).await?;
        if !self.done.swap(true, Ordering::SeqCst) {
            for alert in &batch {
                let mut acked = alert.clone();
                acked.status = AlertStatus::Acknowledged;
                acked.version += 1;
                self.inner.save(&acked).await?;
            }
        }
        Ok(batch)
    }

    async fn replace_if_version(&self, alert: &Alert, expected_version: u64) -> Result<bool, RepoError> {
        self.inner.replace_if_version(alert, expected_version).await
    }

    async fn count_by_status(&self) -> Result<StatusCounts, RepoError> {
        self.inner.count_by_status().await
    }
}

#[tokio::test]
async fn acknowledgements_during_escalation_walk_skip_nothing() {
    let configurations = MemoryConfigurationRepository::new();
    configurations.save(&escalating_configuration()).await.unwrap();
    let sms = ScriptedNotifier::new(Channel::Sms, Behavior::Succeed);
    let mut registry = NotifierRegistry::new();
    registry.register(sms.clone());
    let engine = DispatchEngine::new(
        AlertStore::new(Arc::new(AcknowledgedMidWalk {
            inner: MemoryAlertRepository::new(),
            done: AtomicBool::new(false),
        })),
        Arc::new(configurations),
        DeliveryTracker::new(Arc::new(MemoryDeliveryRepository::new()), Duration::from_secs(3_600)),
        registry,
        DispatchConfig::default(),
    );
    for i in 0..250 {
        engine
            .alerts()
            .create(NewAlert::new("Counterparty exposure", AlertType::Risk, Severity::High), i)
            .await
            .unwrap();
    }

    let sweep = engine.escalation_sweep(10 * MINUTE).await.unwrap();
    assert_eq!(sweep.examined, 250);
    assert_eq!(sweep.skipped, 100);
    assert_eq!(sweep.deliveries.sent, 150);
    assert_eq!(sms.sends(), 150);
}

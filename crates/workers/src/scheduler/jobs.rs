use async_trait::async_trait;
use std::time::Duration;

use riskwatch_common::clock::now_ms;

use crate::dispatch::DispatchEngine;

use super::job::{Job, JobError};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub retry_interval: Duration,
    pub escalation_interval: Duration,
    pub health_interval: Duration,
    pub cleanup_hour: u32,
    pub cleanup_minute: u32,
    pub retention: Duration,
    pub jitter: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(60),
            escalation_interval: Duration::from_secs(300),
            health_interval: Duration::from_secs(900),
            cleanup_hour: 2,
            cleanup_minute: 0,
            retention: Duration::from_secs(30 * 86_400),
            jitter: 0.1,
        }
    }
}

pub struct RetrySweepJob {
    engine: DispatchEngine,
}

impl RetrySweepJob {
    pub fn new(engine: DispatchEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Job for RetrySweepJob {
    fn name(&self) -> &'static str {
        "retry-sweep"
    }

    async fn run(&self) -> Result<(), JobError> {
        self.engine.retry_sweep(now_ms()).await?;
        Ok(())
    }
}

pub struct EscalationSweepJob {
    engine: DispatchEngine,
}

impl EscalationSweepJob {
    pub fn new(engine: DispatchEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Job for EscalationSweepJob {
    fn name(&self) -> &'static str {
        "escalation-sweep"
    }

    async fn run(&self) -> Result<(), JobError> {
        let report = self.engine.escalation_sweep(now_ms()).await?;
        if report.examined > 0 {
            tracing::info!(
                escalations = report.examined - report.skipped,
                skipped = report.skipped,
                deliveries = report.deliveries.deliveries,
                "escalation sweep finished"
            );
        }
        Ok(())
    }
}

pub struct CleanupJob {
    engine: DispatchEngine,
    retention: Duration,
}

impl CleanupJob {
    pub fn new(engine: DispatchEngine, retention: Duration) -> Self {
        Self { engine, retention }
    }
}

#[async_trait]
impl Job for CleanupJob {
    fn name(&self) -> &'static str {
        "delivery-cleanup"
    }

    async fn run(&self) -> Result<(), JobError> {
        let cutoff = now_ms() - self.retention.as_millis() as i64;
        self.engine.cleanup(cutoff).await?;
        Ok(())
    }
}

pub struct HealthCheckJob {
    engine: DispatchEngine,
}

impl HealthCheckJob {
    pub fn new(engine: DispatchEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Job for HealthCheckJob {
    fn name(&self) -> &'static str {
        "channel-health"
    }

    async fn run(&self) -> Result<(), JobError> {
        let statuses = self.engine.health_check(now_ms()).await;
        let unreachable = statuses.iter().filter(|s| !s.reachable).count();
        tracing::info!(channels = statuses.len(), unreachable, "channel health checked");
        Ok(())
    }
}

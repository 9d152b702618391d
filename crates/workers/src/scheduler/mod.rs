//! Periodic background jobs. Each job owns a task: it sleeps until its next
//! slot, runs to completion, then computes the following slot, so a slow run
//! skips ticks instead of overlapping itself. Failures and panics are logged
//! per job and never reach other jobs.

mod jitter;
mod job;
mod jobs;

pub use jitter::apply_jitter;
pub use job::{Job, JobError, Schedule};
pub use jobs::{
    CleanupJob, EscalationSweepJob, HealthCheckJob, RetrySweepJob, SchedulerSettings,
};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dispatch::DispatchEngine;

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<(Arc<dyn Job>, Schedule)>,
}

pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stops scheduling new runs and waits for in-flight runs to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four dispatch jobs: retry sweep, escalation sweep, retention
    /// cleanup and channel health.
    pub fn with_dispatch_jobs(engine: DispatchEngine, settings: &SchedulerSettings) -> Self {
        let mut s = Self::new();
        s.register(
            RetrySweepJob::new(engine.clone()),
            Schedule::Every {
                interval: settings.retry_interval,
                jitter: settings.jitter,
            },
        )
        .register(
            EscalationSweepJob::new(engine.clone()),
            Schedule::Every {
                interval: settings.escalation_interval,
                jitter: settings.jitter,
            },
        )
        .register(
            CleanupJob::new(engine.clone(), settings.retention),
            Schedule::DailyAt {
                hour: settings.cleanup_hour,
                minute: settings.cleanup_minute,
            },
        )
        .register(
            HealthCheckJob::new(engine),
            Schedule::Every {
                interval: settings.health_interval,
                jitter: settings.jitter,
            },
        );
        s
    }

    pub fn register(&mut self, job: impl Job, schedule: Schedule) -> &mut Self {
        self.jobs.push((Arc::new(job), schedule));
        self
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|(j, _)| j.name()).collect()
    }

    pub fn spawn_all(self) -> SchedulerHandle {
        let (stop, stop_rx) = watch::channel(false);
        let tasks = self
            .jobs
            .into_iter()
            .map(|(job, schedule)| tokio::spawn(job_loop(job, schedule, stop_rx.clone())))
            .collect();
        SchedulerHandle { stop, tasks }
    }
}

async fn job_loop(job: Arc<dyn Job>, schedule: Schedule, mut stop: watch::Receiver<bool>) {
    tracing::info!(job = job.name(), ?schedule, "job scheduled");
    loop {
        let delay = schedule.next_delay(chrono::Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
        if *stop.borrow() {
            break;
        }
        run_once(&job).await;
    }
    tracing::info!(job = job.name(), "job stopped");
}

async fn run_once(job: &Arc<dyn Job>) {
    let name = job.name();
    let started = Instant::now();
    let runner = job.clone();
    match tokio::spawn(async move { runner.run().await }).await {
        Ok(Ok(())) => {
            tracing::debug!(job = name, elapsed_ms = started.elapsed().as_millis() as u64, "job finished");
        }
        Ok(Err(e)) => tracing::error!(job = name, error = %e, "job failed"),
        Err(e) => tracing::error!(job = name, error = %e, "job panicked"),
    }
}

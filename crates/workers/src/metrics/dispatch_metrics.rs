use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    alerts_dispatched: AtomicU64,
    deliveries_sent: AtomicU64,
    deliveries_retry_scheduled: AtomicU64,
    deliveries_exhausted: AtomicU64,
    send_timeouts: AtomicU64,
    retries_claimed: AtomicU64,
    escalations: AtomicU64,
    deliveries_purged: AtomicU64,
    send_latency_sum_us: AtomicU64,
    send_latency_count: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_alerts_dispatched(&self) {
        self.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deliveries_sent(&self) {
        self.deliveries_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deliveries_retry_scheduled(&self) {
        self.deliveries_retry_scheduled
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deliveries_exhausted(&self) {
        self.deliveries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_send_timeouts(&self) {
        self.send_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries_claimed(&self) {
        self.retries_claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalations(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_deliveries_purged(&self, count: u64) {
        self.deliveries_purged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_send_latency(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.send_latency_sum_us.fetch_add(us, Ordering::Relaxed);
        self.send_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alerts_dispatched_val(&self) -> u64 {
        self.alerts_dispatched.load(Ordering::Relaxed)
    }

    pub fn deliveries_sent_val(&self) -> u64 {
        self.deliveries_sent.load(Ordering::Relaxed)
    }

    pub fn deliveries_retry_scheduled_val(&self) -> u64 {
        self.deliveries_retry_scheduled.load(Ordering::Relaxed)
    }

    pub fn deliveries_exhausted_val(&self) -> u64 {
        self.deliveries_exhausted.load(Ordering::Relaxed)
    }

    pub fn send_timeouts_val(&self) -> u64 {
        self.send_timeouts.load(Ordering::Relaxed)
    }

    pub fn retries_claimed_val(&self) -> u64 {
        self.retries_claimed.load(Ordering::Relaxed)
    }

    pub fn escalations_val(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }

    pub fn deliveries_purged_val(&self) -> u64 {
        self.deliveries_purged.load(Ordering::Relaxed)
    }

    pub fn send_latency_vals(&self) -> (u64, u64) {
        (
            self.send_latency_sum_us.load(Ordering::Relaxed),
            self.send_latency_count.load(Ordering::Relaxed),
        )
    }
}

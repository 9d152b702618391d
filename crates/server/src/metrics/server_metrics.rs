use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct ServerMetrics {
    rest_requests_total: AtomicU64,
    rest_errors_total: AtomicU64,
    requests_admitted_total: AtomicU64,
    requests_rate_limited_total: AtomicU64,
    buckets_evicted_total: AtomicU64,
    alerts_created_total: AtomicU64,
    alerts_acknowledged_total: AtomicU64,
    alerts_resolved_total: AtomicU64,
    rest_latency_sum_us: AtomicU64,
    rest_latency_count: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_rest_requests(&self) {
        self.rest_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rest_errors(&self) {
        self.rest_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_admitted(&self) {
        self.requests_admitted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_rate_limited(&self) {
        self.requests_rate_limited_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_buckets_evicted(&self, n: u64) {
        self.buckets_evicted_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_alerts_created(&self) {
        self.alerts_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_acknowledged(&self) {
        self.alerts_acknowledged_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_resolved(&self) {
        self.alerts_resolved_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rest_latency(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.rest_latency_sum_us.fetch_add(us, Ordering::Relaxed);
        self.rest_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rest_requests_total(&self) -> u64 {
        self.rest_requests_total.load(Ordering::Relaxed)
    }

    pub fn rest_errors_total(&self) -> u64 {
        self.rest_errors_total.load(Ordering::Relaxed)
    }

    pub fn requests_admitted_total(&self) -> u64 {
        self.requests_admitted_total.load(Ordering::Relaxed)
    }

    pub fn requests_rate_limited_total(&self) -> u64 {
        self.requests_rate_limited_total.load(Ordering::Relaxed)
    }

    pub fn buckets_evicted_total(&self) -> u64 {
        self.buckets_evicted_total.load(Ordering::Relaxed)
    }

    pub fn alerts_created_total(&self) -> u64 {
        self.alerts_created_total.load(Ordering::Relaxed)
    }

    pub fn alerts_acknowledged_total(&self) -> u64 {
        self.alerts_acknowledged_total.load(Ordering::Relaxed)
    }

    pub fn alerts_resolved_total(&self) -> u64 {
        self.alerts_resolved_total.load(Ordering::Relaxed)
    }

    pub fn rest_latency_vals(&self) -> (u64, u64) {
        (
            self.rest_latency_sum_us.load(Ordering::Relaxed),
            self.rest_latency_count.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = ServerMetrics::new();
        m.inc_rest_requests();
        m.inc_rest_requests();
        m.inc_rest_errors();
        m.inc_requests_admitted();
        m.inc_requests_rate_limited();
        m.add_buckets_evicted(3);
        m.inc_alerts_created();
        m.inc_alerts_acknowledged();
        m.inc_alerts_resolved();

        assert_eq!(m.rest_requests_total(), 2);
        assert_eq!(m.rest_errors_total(), 1);
        assert_eq!(m.requests_admitted_total(), 1);
        assert_eq!(m.requests_rate_limited_total(), 1);
        assert_eq!(m.buckets_evicted_total(), 3);
        assert_eq!(m.alerts_created_total(), 1);
        assert_eq!(m.alerts_acknowledged_total(), 1);
        assert_eq!(m.alerts_resolved_total(), 1);
    }

    #[test]
    fn latency_recording() {
        let m = ServerMetrics::new();
        let start = Instant::now();
        std::thread::sleep(std::time::Duration::from_millis(1));
        m.record_rest_latency(start);
        let (sum, count) = m.rest_latency_vals();
        assert!(sum > 0);
        assert_eq!(count, 1);
    }
}

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Capacity and refill rate of one class of bucket.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Quota {
    pub capacity: u32,
    pub refill_per_minute: f64,
}

impl Quota {
    pub const fn new(capacity: u32, refill_per_minute: f64) -> Self {
        Self {
            capacity,
            refill_per_minute,
        }
    }

    pub fn refill_per_sec(&self) -> f64 {
        self.refill_per_minute / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    pub allowed: bool,
    pub remaining: u64,
}

/// Refill is computed lazily from elapsed time on every access; there is no
/// timer per bucket. Token count stays within `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
    last_used: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self::new_at(capacity, refill_per_sec, Instant::now())
    }

    pub fn new_at(capacity: u32, refill_per_sec: f64, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec: refill_per_sec.max(0.0),
            tokens: capacity as f64,
            last_refill: now,
            last_used: now,
        }
    }

    pub fn from_quota(quota: &Quota, now: Instant) -> Self {
        Self::new_at(quota.capacity, quota.refill_per_sec(), now)
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    pub fn try_consume(&mut self, n: u32) -> Consumption {
        self.try_consume_at(n, Instant::now())
    }

    /// Takes `n` tokens if available. A rejection leaves the token count as
    /// it was after refill.
    pub fn try_consume_at(&mut self, n: u32, now: Instant) -> Consumption {
        self.refill(now);
        self.last_used = self.last_used.max(now);

        let wanted = n as f64;
        let allowed = self.tokens >= wanted;
        if allowed {
            self.tokens -= wanted;
        }
        Consumption {
            allowed,
            remaining: self.tokens.floor() as u64,
        }
    }

    pub fn available_at(&self, now: Instant) -> u64 {
        self.projected(now).floor() as u64
    }

    pub fn is_full_at(&self, now: Instant) -> bool {
        self.projected(now) >= self.capacity
    }

    /// How long until `tokens` are available. `Duration::MAX` when the bucket
    /// never refills or could never hold that many.
    pub fn time_until(&self, tokens: u32, now: Instant) -> Duration {
        let wanted = tokens as f64;
        let deficit = wanted - self.projected(now);
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_per_sec <= 0.0 || wanted > self.capacity {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(deficit / self.refill_per_sec).unwrap_or(Duration::MAX)
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    fn projected(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_per_sec).min(self.capacity)
    }

    fn refill(&mut self, now: Instant) {
        if now > self.last_refill {
            self.tokens = self.projected(now);
            self.last_refill = now;
        }
    }
}

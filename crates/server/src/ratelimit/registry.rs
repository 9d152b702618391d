use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::bucket::{Quota, TokenBucket};
use super::class::EndpointClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Ip,
    User,
    Class(EndpointClass),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub identity: String,
    pub scope: Scope,
}

impl BucketKey {
    pub fn new(identity: impl Into<String>, scope: Scope) -> Self {
        Self {
            identity: identity.into(),
            scope,
        }
    }
}

pub type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Concurrent map of buckets. The map lock is only held to find or insert an
/// entry; consumption locks the single bucket.
#[derive(Clone, Default)]
pub struct BucketRegistry {
    buckets: Arc<DashMap<BucketKey, SharedBucket>>,
    trimming: Arc<AtomicBool>,
}

pub(crate) fn lock(bucket: &Mutex<TokenBucket>) -> MutexGuard<'_, TokenBucket> {
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: BucketKey, quota: &Quota, now: Instant) -> SharedBucket {
        if let Some(existing) = self.buckets.get(&key) {
            return existing.value().clone();
        }
        self.buckets
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::from_quota(quota, now))))
            .value()
            .clone()
    }

    pub fn get(&self, key: &BucketKey) -> Option<SharedBucket> {
        self.buckets.get(key).map(|b| b.value().clone())
    }

    /// Drops buckets idle for longer than `ttl` that have refilled to
    /// capacity. A full bucket is indistinguishable from a fresh one, so
    /// nothing is forgiven by removing it.
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let b = lock(bucket);
            let keep = b.idle_for(now) <= ttl || !b.is_full_at(now);
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Keeps at most `max_entries` buckets, dropping the least recently used.
    pub fn enforce_capacity(&self, max_entries: usize) -> usize {
        let len = self.buckets.len();
        if len <= max_entries {
            return 0;
        }

        let mut by_age: Vec<(Instant, BucketKey)> = self
            .buckets
            .iter()
            .map(|e| (lock(e.value()).last_used(), e.key().clone()))
            .collect();
        by_age.sort_by_key(|(used, _)| *used);

        let excess = len - max_entries;
        let mut dropped = 0;
        for (_, key) in by_age.into_iter().take(excess) {
            if self.buckets.remove(&key).is_some() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, max_entries, "bucket registry over capacity, dropped least recently used");
        }
        dropped
    }

    /// Request-path guard for `max_entries`. Once the registry grows past it,
    /// one caller trims back to 90% of the cap while the others carry on.
    pub fn trim_if_over(&self, max_entries: usize) -> usize {
        if self.buckets.len() <= max_entries {
            return 0;
        }
        if self.trimming.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let dropped = self.enforce_capacity(max_entries - max_entries / 10);
        self.trimming.store(false, Ordering::Release);
        dropped
    }

    /// Removes every bucket belonging to `identity`, whatever its scope.
    pub fn reset(&self, identity: &str) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|k, _| k.identity != identity);
        before.saturating_sub(self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

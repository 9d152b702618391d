use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use riskwatch_common::clock::now_ms;

use super::bucket::Quota;
use super::class::EndpointClass;
use super::registry::{lock, BucketKey, BucketRegistry, Scope};
use crate::metrics::server_metrics::ServerMetrics;

#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionPolicy {
    pub ip: Quota,
    pub user: Quota,
    pub default: Quota,
    pub auth: Quota,
    pub ml_inference: Quota,
    pub report_generation: Quota,
    pub idle_ttl: Duration,
    pub max_entries: usize,
    /// Peers allowed to name the client in forwarding headers. Empty means
    /// every peer is believed.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            ip: Quota::new(300, 30.0),
            user: Quota::new(200, 20.0),
            default: Quota::new(100, 10.0),
            auth: Quota::new(5, 1.0),
            ml_inference: Quota::new(20, 20.0 / 60.0),
            report_generation: Quota::new(5, 5.0 / 60.0),
            idle_ttl: Duration::from_secs(600),
            max_entries: 100_000,
            trusted_proxies: Vec::new(),
        }
    }
}

impl AdmissionPolicy {
    pub fn quota_for(&self, class: EndpointClass) -> &Quota {
        match class {
            EndpointClass::Default => &self.default,
            EndpointClass::Auth => &self.auth,
            EndpointClass::MlInference => &self.ml_inference,
            EndpointClass::ReportGeneration => &self.report_generation,
        }
    }
}

/// Identity of the caller as resolved by the boundary layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub ip: Option<String>,
    pub user: Option<String>,
}

impl RequestIdentity {
    /// Key for the endpoint-class bucket: the user when known, else the IP.
    pub fn principal(&self) -> &str {
        self.user
            .as_deref()
            .or(self.ip.as_deref())
            .unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub remaining: u64,
    pub reset_at_ms: i64,
    pub retry_after: Duration,
    pub limited_by: Option<Scope>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allowed
    }

    /// Combines two checks made for one request: the tighter remaining count
    /// and the later reset win.
    fn merge(self, other: Decision) -> Decision {
        Decision {
            outcome: other.outcome,
            remaining: self.remaining.min(other.remaining),
            reset_at_ms: self.reset_at_ms.max(other.reset_at_ms),
            retry_after: self.retry_after.max(other.retry_after),
            limited_by: other.limited_by,
        }
    }

    pub fn message(&self) -> String {
        match self.limited_by {
            Some(Scope::Ip) => "IP rate limit exceeded".into(),
            Some(Scope::User) => "User rate limit exceeded".into(),
            Some(Scope::Class(class)) => format!("{class} rate limit exceeded"),
            None => "Rate limit exceeded".into(),
        }
    }
}

/// Admission decisions over the bucket registry. Rejection is an outcome,
/// never an error.
#[derive(Clone)]
pub struct AdmissionController {
    registry: BucketRegistry,
    policy: Arc<AdmissionPolicy>,
    metrics: Arc<ServerMetrics>,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry: BucketRegistry::new(),
            policy: Arc::new(policy),
            metrics,
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    pub fn admit(&self, identity: &str, class: EndpointClass) -> Decision {
        self.admit_at(identity, class, Instant::now(), now_ms())
    }

    pub fn admit_at(
        &self,
        identity: &str,
        class: EndpointClass,
        now: Instant,
        now_ms: i64,
    ) -> Decision {
        let decision = self.check(
            BucketKey::new(identity, Scope::Class(class)),
            self.policy.quota_for(class),
            now,
            now_ms,
        );
        self.observe(&decision);
        decision
    }

    pub fn admit_request(&self, identity: &RequestIdentity, class: EndpointClass) -> Decision {
        self.admit_request_at(identity, class, Instant::now(), now_ms())
    }

    /// IP bucket first, then user, then endpoint class. The first rejection
    /// stops the chain.
    pub fn admit_request_at(
        &self,
        identity: &RequestIdentity,
        class: EndpointClass,
        now: Instant,
        now_ms: i64,
    ) -> Decision {
        let mut checks: Vec<(BucketKey, &Quota)> = Vec::with_capacity(3);
        if let Some(ip) = &identity.ip {
            checks.push((BucketKey::new(ip.clone(), Scope::Ip), &self.policy.ip));
        }
        if let Some(user) = &identity.user {
            checks.push((BucketKey::new(user.clone(), Scope::User), &self.policy.user));
        }
        checks.push((
            BucketKey::new(identity.principal(), Scope::Class(class)),
            self.policy.quota_for(class),
        ));

        let mut combined: Option<Decision> = None;
        for (key, quota) in checks {
            let d = self.check(key, quota, now, now_ms);
            let limited = !d.is_allowed();
            let merged = match combined {
                Some(prev) => prev.merge(d),
                None => d,
            };
            if limited {
                self.observe(&merged);
                return merged;
            }
            combined = Some(merged);
        }

        let decision = combined.unwrap_or(Decision {
            outcome: Outcome::Allowed,
            remaining: 0,
            reset_at_ms: now_ms,
            retry_after: Duration::ZERO,
            limited_by: None,
        });
        self.observe(&decision);
        decision
    }

    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let idle = self.registry.evict_idle(now, self.policy.idle_ttl);
        let over = self.registry.enforce_capacity(self.policy.max_entries);
        self.metrics.add_buckets_evicted((idle + over) as u64);
        idle + over
    }

    pub fn reset(&self, identity: &str) -> usize {
        let dropped = self.registry.reset(identity);
        tracing::info!(identity, dropped, "rate limit buckets reset");
        dropped
    }

    fn check(&self, key: BucketKey, quota: &Quota, now: Instant, now_ms: i64) -> Decision {
        let scope = key.scope;
        let bucket = self.registry.get_or_create(key, quota, now);
        let trimmed = self.registry.trim_if_over(self.policy.max_entries);
        if trimmed > 0 {
            self.metrics.add_buckets_evicted(trimmed as u64);
        }
        let mut b = lock(&bucket);
        let consumed = b.try_consume_at(1, now);

        let reset_at_ms = now_ms.saturating_add(millis(b.time_until(quota.capacity, now)));
        if consumed.allowed {
            return Decision {
                outcome: Outcome::Allowed,
                remaining: consumed.remaining,
                reset_at_ms,
                retry_after: Duration::ZERO,
                limited_by: None,
            };
        }
        Decision {
            outcome: Outcome::RateLimited,
            remaining: 0,
            reset_at_ms,
            retry_after: b.time_until(1, now),
            limited_by: Some(scope),
        }
    }

    fn observe(&self, decision: &Decision) {
        match decision.limited_by {
            None => self.metrics.inc_requests_admitted(),
            Some(scope) => {
                self.metrics.inc_requests_rate_limited();
                tracing::debug!(?scope, retry_after_ms = millis(decision.retry_after), "request rate limited");
            }
        }
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

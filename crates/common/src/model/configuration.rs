use serde::{Deserialize, Serialize};

use super::alert::{Alert, AlertType, Severity};
use super::delivery::Channel;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelTarget {
    pub channel: Channel,
    pub recipient: String,
}

impl ChannelTarget {
    pub fn new(channel: Channel, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
        }
    }
}

/// Alternate recipients notified once when an alert stays NEW past `deadline_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationTier {
    pub deadline_ms: i64,
    pub targets: Vec<ChannelTarget>,
}

impl EscalationTier {
    /// Thirty days.
    pub const MAX_DEADLINE_MS: i64 = 30 * 24 * 60 * 60 * 1_000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfiguration {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub alert_type: AlertType,
    pub enabled: bool,
    pub min_severity: Option<Severity>,
    pub channels: Vec<ChannelTarget>,
    pub escalation: Option<EscalationTier>,
    pub retry: RetryPolicy,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AlertConfiguration {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.enabled
            && self.alert_type == alert.alert_type
            && self.min_severity.map_or(true, |floor| alert.severity >= floor)
    }
}

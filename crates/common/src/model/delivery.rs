use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::configuration::RetryPolicy;
use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Chat,
    Push,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Self::Email, Self::Sms, Self::Chat, Self::Push];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Chat => "chat",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "chat" | "slack" => Ok(Self::Chat),
            "push" => Ok(Self::Push),
            _ => Err(ParseEnumError::new("channel", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Escalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    PendingRetry,
    Exhausted,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::PendingRetry => "PENDING_RETRY",
            Self::Exhausted => "EXHAUSTED",
        }
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Sent)
                | (Self::Pending, Self::Failed)
                | (Self::Failed, Self::PendingRetry)
                | (Self::Failed, Self::Exhausted)
                | (Self::PendingRetry, Self::Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Exhausted)
    }
}

impl FromStr for DeliveryStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            "PENDING_RETRY" => Ok(Self::PendingRetry),
            "EXHAUSTED" => Ok(Self::Exhausted),
            _ => Err(ParseEnumError::new("delivery status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Everything needed to open a delivery; the retry policy is copied so replays
/// survive the configuration being edited or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryDraft {
    pub alert_id: String,
    pub configuration_id: String,
    pub channel: Channel,
    pub recipient: String,
    pub tier: Tier,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDelivery {
    pub id: String,
    pub alert_id: String,
    pub configuration_id: String,
    pub channel: Channel,
    pub recipient: String,
    pub tier: Tier,
    pub attempt: u32,
    pub status: DeliveryStatus,
    pub last_error: Option<String>,
    pub failure: Option<FailureKind>,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub next_retry_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl NotificationDelivery {
    pub fn open(draft: DeliveryDraft, now_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert_id: draft.alert_id,
            configuration_id: draft.configuration_id,
            channel: draft.channel,
            recipient: draft.recipient,
            tier: draft.tier,
            attempt: 1,
            status: DeliveryStatus::Pending,
            last_error: None,
            failure: None,
            max_attempts: draft.retry.max_attempts.max(1),
            backoff_base_ms: draft.retry.backoff_base_ms,
            next_retry_at_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_stale_pending(&self, cutoff_ms: i64) -> bool {
        self.status == DeliveryStatus::Pending && self.updated_at_ms < cutoff_ms
    }

    pub fn is_retry_due(&self, now_ms: i64) -> bool {
        self.status == DeliveryStatus::PendingRetry
            && self.next_retry_at_ms.is_some_and(|at| at <= now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DeliveryDraft {
        DeliveryDraft {
            alert_id: "a-1".into(),
            configuration_id: "cfg-1".into(),
            channel: Channel::Email,
            recipient: "ops@example.com".into(),
            tier: Tier::Primary,
            retry: RetryPolicy {
                max_attempts: 0,
                backoff_base_ms: 1_000,
            },
        }
    }

    #[test]
    fn open_starts_pending_first_attempt() {
        let d = NotificationDelivery::open(draft(), 5_000);
        assert_eq!(d.status, DeliveryStatus::Pending);
        assert_eq!(d.attempt, 1);
        assert_eq!(d.created_at_ms, 5_000);
        assert_eq!(d.max_attempts, 1);
    }

    #[test]
    fn legal_transitions() {
        use DeliveryStatus::*;
        assert!(Pending.can_transition_to(Sent));
        assert!(Pending.can_transition_to(Failed));
        assert!(Failed.can_transition_to(PendingRetry));
        assert!(Failed.can_transition_to(Exhausted));
        assert!(PendingRetry.can_transition_to(Pending));
    }

    #[test]
    fn illegal_transitions() {
        use DeliveryStatus::*;
        assert!(!Sent.can_transition_to(Pending));
        assert!(!Exhausted.can_transition_to(PendingRetry));
        assert!(!Pending.can_transition_to(PendingRetry));
        assert!(!PendingRetry.can_transition_to(Sent));
    }

    #[test]
    fn retry_due_only_after_scheduled_time() {
        let mut d = NotificationDelivery::open(draft(), 0);
        d.status = DeliveryStatus::PendingRetry;
        d.next_retry_at_ms = Some(10_000);
        assert!(!d.is_retry_due(9_999));
        assert!(d.is_retry_due(10_000));
    }

    #[test]
    fn stale_only_when_pending_and_untouched() {
        let mut d = NotificationDelivery::open(draft(), 1_000);
        assert!(!d.is_stale_pending(1_000));
        assert!(d.is_stale_pending(1_001));
        d.status = DeliveryStatus::PendingRetry;
        assert!(!d.is_stale_pending(i64::MAX));
    }

    #[test]
    fn channel_parses_slack_alias() {
        assert_eq!("slack".parse::<Channel>().unwrap(), Channel::Chat);
        assert_eq!("SMS".parse::<Channel>().unwrap(), Channel::Sms);
    }
}

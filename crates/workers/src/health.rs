//! Last known reachability per channel, fed by the health-check job.
//!
//! Dispatch never consults this: a channel that fails its probe still gets
//! every delivery attempt.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use riskwatch_common::model::Channel;

use crate::notifier::NotifyError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub channel: Channel,
    pub notifier: String,
    pub reachable: bool,
    pub detail: Option<String>,
    pub checked_at_ms: i64,
}

#[derive(Clone, Default)]
pub struct ChannelHealth {
    statuses: Arc<DashMap<Channel, ChannelStatus>>,
}

impl ChannelHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        channel: Channel,
        notifier: &str,
        result: &Result<(), NotifyError>,
        now_ms: i64,
    ) -> ChannelStatus {
        let status = ChannelStatus {
            channel,
            notifier: notifier.to_string(),
            reachable: result.is_ok(),
            detail: result.as_ref().err().map(|e| e.message.clone()),
            checked_at_ms: now_ms,
        };
        self.statuses.insert(channel, status.clone());
        status
    }

    pub fn get(&self, channel: Channel) -> Option<ChannelStatus> {
        self.statuses.get(&channel).map(|s| s.clone())
    }

    pub fn snapshot(&self) -> Vec<ChannelStatus> {
        let mut all: Vec<ChannelStatus> = self.statuses.iter().map(|s| s.value().clone()).collect();
        all.sort_by_key(|s| s.channel.as_str());
        all
    }

    pub fn unreachable_count(&self) -> usize {
        self.statuses.iter().filter(|s| !s.reachable).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_probe_wins() {
        let h = ChannelHealth::new();
        h.record(Channel::Sms, "sms", &Err(NotifyError::transient("refused")), 1);
        assert_eq!(h.unreachable_count(), 1);
        assert_eq!(h.get(Channel::Sms).unwrap().detail.as_deref(), Some("refused"));

        h.record(Channel::Sms, "sms", &Ok(()), 2);
        let s = h.get(Channel::Sms).unwrap();
        assert!(s.reachable);
        assert!(s.detail.is_none());
        assert_eq!(s.checked_at_ms, 2);
        assert_eq!(h.unreachable_count(), 0);
    }

    #[test]
    fn snapshot_sorted_by_channel() {
        let h = ChannelHealth::new();
        h.record(Channel::Sms, "sms", &Ok(()), 1);
        h.record(Channel::Email, "smtp", &Ok(()), 1);
        let names: Vec<_> = h.snapshot().into_iter().map(|s| s.channel).collect();
        assert_eq!(names, vec![Channel::Email, Channel::Sms]);
    }
}

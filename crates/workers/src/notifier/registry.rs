use std::collections::HashMap;
use std::sync::Arc;

use riskwatch_common::model::Channel;

use super::channel::Notifier;

#[derive(Clone, Default)]
pub struct NotifierRegistry {
    by_channel: HashMap<Channel, Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any notifier already registered for the same channel.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) -> &mut Self {
        let channel = notifier.channel();
        if self.by_channel.insert(channel, notifier).is_some() {
            tracing::warn!(%channel, "notifier replaced");
        }
        self
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.register(notifier);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn Notifier>> {
        self.by_channel.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.by_channel.keys().copied().collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &Arc<dyn Notifier>)> {
        self.by_channel.iter().map(|(c, n)| (*c, n))
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty()
    }
}

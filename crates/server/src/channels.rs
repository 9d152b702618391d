use std::sync::Arc;

use riskwatch_workers::notifier::{
    ChatNotifier, NotifierRegistry, NotifyError, PushNotifier, SmsNotifier, SmtpNotifier,
};

use crate::config::ChannelsConfig;

/// Registers a notifier for every configured transport. Channels left out of
/// the configuration have no notifier, so their deliveries fail permanently.
pub fn build_registry(cfg: &ChannelsConfig) -> Result<NotifierRegistry, NotifyError> {
    let mut registry = NotifierRegistry::new();

    if let Some(smtp) = &cfg.smtp {
        registry.register(Arc::new(SmtpNotifier::new(&smtp.settings())?));
    }
    if let Some(sms) = &cfg.sms {
        registry.register(Arc::new(SmsNotifier::new(
            sms.endpoint.clone(),
            sms.api_key.clone(),
            sms.sender.clone(),
        )));
    }
    if let Some(chat) = &cfg.chat {
        registry.register(Arc::new(ChatNotifier::new(chat.webhook_url.clone())));
    }
    if let Some(push) = &cfg.push {
        registry.register(Arc::new(PushNotifier::new(
            push.endpoint.clone(),
            push.api_key.clone(),
        )));
    }

    if registry.is_empty() {
        tracing::warn!("no notification channels configured");
    } else {
        let channels: Vec<&str> = registry.channels().iter().map(|c| c.as_str()).collect();
        tracing::info!(?channels, "notification channels registered");
    }
    Ok(registry)
}

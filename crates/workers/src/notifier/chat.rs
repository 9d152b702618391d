use async_trait::async_trait;
use reqwest::Client;

use riskwatch_common::model::{Channel, Severity};

use super::channel::{check_response, probe_endpoint, Notifier, NotifyError};
use super::render::RenderedContent;

/// Slack-compatible incoming webhook. The recipient is the target channel
/// name, or `default` to use the webhook's own channel.
pub struct ChatNotifier {
    webhook_url: String,
    client: Client,
}

impl ChatNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
        }
    }
}

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "#36a64f",
        Severity::Medium => "#f2c744",
        Severity::High => "#ff8c00",
        Severity::Critical => "#d32f2f",
    }
}

fn payload(recipient: &str, content: &RenderedContent) -> serde_json::Value {
    let emoji = if content.escalated { ":rotating_light:" } else { ":warning:" };
    let mut payload = serde_json::json!({
        "text": format!("{emoji} {}", content.subject),
        "attachments": [{
            "color": color(content.severity),
            "title": &content.subject,
            "text": &content.body,
            "footer": format!("alert {}", content.alert_id),
        }]
    });
    if !recipient.is_empty() && recipient != "default" {
        payload["channel"] = serde_json::Value::String(recipient.to_string());
    }
    payload
}

#[async_trait]
impl Notifier for ChatNotifier {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    fn name(&self) -> &str {
        "chat"
    }

    async fn send(&self, recipient: &str, content: &RenderedContent) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload(recipient, content))
            .send()
            .await;
        check_response(resp)
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        probe_endpoint(&self.client, &self.webhook_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(escalated: bool) -> RenderedContent {
        RenderedContent {
            alert_id: "a-1".into(),
            severity: Severity::Critical,
            escalated,
            subject: "[CRIT] Supplier insolvency (financial)".into(),
            body: "Alert: Supplier insolvency\n".into(),
        }
    }

    #[test]
    fn payload_targets_channel() {
        let p = payload("#risk-ops", &content(false));
        assert_eq!(p["channel"], "#risk-ops");
        assert_eq!(p["attachments"][0]["color"], "#d32f2f");
        assert!(p["text"].as_str().unwrap().starts_with(":warning:"));
    }

    #[test]
    fn default_recipient_omits_channel() {
        let p = payload("default", &content(true));
        assert!(p.get("channel").is_none());
        assert!(p["text"].as_str().unwrap().starts_with(":rotating_light:"));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_transient() {
        let n = ChatNotifier::new("http://127.0.0.1:1/hook".into());
        let err = n.send("default", &content(false)).await.unwrap_err();
        assert!(err.is_transient());
    }
}

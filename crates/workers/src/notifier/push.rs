use async_trait::async_trait;
use reqwest::Client;

use riskwatch_common::model::Channel;

use super::channel::{check_response, probe_endpoint, Notifier, NotifyError};
use super::render::RenderedContent;

/// HTTP push gateway; the recipient is a device token or topic.
pub struct PushNotifier {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl PushNotifier {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            endpoint,
            api_key,
            client: Client::new(),
        }
    }
}

fn payload(recipient: &str, content: &RenderedContent) -> serde_json::Value {
    let priority = if content.escalated { "high" } else { "normal" };
    serde_json::json!({
        "to": recipient,
        "notification": {
            "title": &content.subject,
            "body": content.body.lines().next().unwrap_or_default(),
        },
        "data": {
            "alert_id": &content.alert_id,
            "severity": content.severity.as_str(),
            "escalated": content.escalated,
        },
        "priority": priority,
    })
}

#[async_trait]
impl Notifier for PushNotifier {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    fn name(&self) -> &str {
        "push"
    }

    async fn send(&self, recipient: &str, content: &RenderedContent) -> Result<(), NotifyError> {
        if recipient.trim().is_empty() {
            return Err(NotifyError::permanent("empty device token"));
        }
        let mut req = self.client.post(&self.endpoint).json(&payload(recipient, content));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        check_response(req.send().await)
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        probe_endpoint(&self.client, &self.endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_common::model::Severity;

    #[test]
    fn escalated_pushes_are_high_priority() {
        let content = RenderedContent {
            alert_id: "a-3".into(),
            severity: Severity::High,
            escalated: true,
            subject: "[ESCALATED] [HIGH] Quality drift (compliance)".into(),
            body: "This alert is still unacknowledged and has been escalated.\nAlert: Quality drift\n".into(),
        };
        let p = payload("device-abc", &content);
        assert_eq!(p["priority"], "high");
        assert_eq!(p["data"]["severity"], "high");
        assert_eq!(
            p["notification"]["body"],
            "This alert is still unacknowledged and has been escalated."
        );
    }
}

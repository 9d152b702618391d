use async_trait::async_trait;
use reqwest::Client;

use riskwatch_common::model::Channel;

use super::channel::{check_response, probe_endpoint, Notifier, NotifyError};
use super::render::RenderedContent;

/// Texts are truncated to one concatenated SMS worth of characters.
const MAX_SMS_CHARS: usize = 320;

/// Posts `{to, from, message}` to an HTTP SMS gateway.
pub struct SmsNotifier {
    endpoint: String,
    api_key: Option<String>,
    sender: String,
    client: Client,
}

impl SmsNotifier {
    pub fn new(endpoint: String, api_key: Option<String>, sender: String) -> Self {
        Self {
            endpoint,
            api_key,
            sender,
            client: Client::new(),
        }
    }
}

fn is_phone_number(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    (6..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn sms_text(content: &RenderedContent) -> String {
    let mut text = content.subject.clone();
    if text.chars().count() > MAX_SMS_CHARS {
        text = text.chars().take(MAX_SMS_CHARS - 3).collect();
        text.push_str("...");
    }
    text
}

fn payload(sender: &str, recipient: &str, content: &RenderedContent) -> serde_json::Value {
    serde_json::json!({
        "to": recipient,
        "from": sender,
        "message": sms_text(content),
        "reference": content.alert_id,
    })
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, recipient: &str, content: &RenderedContent) -> Result<(), NotifyError> {
        if !is_phone_number(recipient) {
            return Err(NotifyError::permanent(format!(
                "not a phone number: {recipient}"
            )));
        }

        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&payload(&self.sender, recipient, content));
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

    fn content(subject: &str) -> RenderedContent {
        RenderedContent {
            alert_id: "a-9".into(),
            severity: Severity::Critical,
            escalated: false,
            subject: subject.into(),
            body: String::new(),
        }
    }

    #[test]
    fn phone_number_validation() {
        assert!(is_phone_number("+33612345678"));
        assert!(is_phone_number("5551234"));
        assert!(!is_phone_number("ops@example.com"));
        assert!(!is_phone_number("+12"));
    }

    #[test]
    fn long_text_truncated() {
        let long = "x".repeat(500);
        let text = sms_text(&content(&long));
        assert_eq!(text.chars().count(), MAX_SMS_CHARS);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn payload_shape() {
        let p = payload("RISKWATCH", "+15550001", &content("[CRIT] Fire"));
        assert_eq!(p["to"], "+15550001");
        assert_eq!(p["message"], "[CRIT] Fire");
        assert_eq!(p["reference"], "a-9");
    }

    #[tokio::test]
    async fn invalid_recipient_never_hits_gateway() {
        let n = SmsNotifier::new("http://127.0.0.1:1/sms".into(), None, "RW".into());
        let err = n.send("not-a-number", &content("x")).await.unwrap_err();
        assert!(!err.is_transient());
    }
}

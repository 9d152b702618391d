use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use riskwatch_common::model::Channel;

use super::channel::{Notifier, NotifyError};
use super::render::RenderedContent;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub starttls: bool,
}

pub struct SmtpNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                NotifyError::permanent(format!("sender address: {e}"))
            })?;

        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| NotifyError::permanent(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder.port(settings.port);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

fn classify(e: lettre::transport::smtp::Error) -> NotifyError {
    if e.is_permanent() {
        NotifyError::permanent(e.to_string())
    } else {
        NotifyError::transient(e.to_string())
    }
}

fn build_message(from: &Mailbox, recipient: &str, content: &RenderedContent) -> Result<Message, NotifyError> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            NotifyError::permanent(format!("recipient {recipient}: {e}"))
        })?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(content.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(content.body.clone())
        .map_err(|e| NotifyError::permanent(e.to_string()))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, recipient: &str, content: &RenderedContent) -> Result<(), NotifyError> {
        let email = build_message(&self.from, recipient, content)?;
        self.transport.send(email).await.map_err(classify)?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), NotifyError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotifyError::transient("smtp server did not answer NOOP")),
            Err(e) => Err(classify(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_common::model::Severity;

    fn content() -> RenderedContent {
        RenderedContent {
            alert_id: "a-1".into(),
            severity: Severity::High,
            escalated: false,
            subject: "[HIGH] Late shipment (risk)".into(),
            body: "Alert: Late shipment\n".into(),
        }
    }

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: None,
            from: "riskwatch@example.com".into(),
            starttls: false,
        }
    }

    #[test]
    fn malformed_recipient_is_permanent() {
        let from: Mailbox = "riskwatch@example.com".parse().unwrap();
        let err = build_message(&from, "not-an-address", &content()).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn builds_message_for_valid_recipient() {
        let from: Mailbox = "riskwatch@example.com".parse().unwrap();
        assert!(build_message(&from, "ops@example.com", &content()).is_ok());
    }

    #[test]
    fn bad_sender_rejected_at_construction() {
        let mut s = settings();
        s.from = "nope".into();
        assert!(SmtpNotifier::new(&s).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() {
        let mut s = settings();
        s.host = "127.0.0.1".into();
        s.port = 1;
        let n = SmtpNotifier::new(&s).unwrap();
        let err = n.send("ops@example.com", &content()).await.unwrap_err();
        assert!(err.is_transient());
    }
}

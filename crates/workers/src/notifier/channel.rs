use async_trait::async_trait;
use reqwest::{Response, StatusCode};

use riskwatch_common::model::{Channel, FailureKind};

use super::render::RenderedContent;

/// One transport. Implementations never retry; the dispatch engine owns
/// retry bookkeeping.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    fn name(&self) -> &str;

    async fn send(&self, recipient: &str, content: &RenderedContent) -> Result<(), NotifyError>;

    /// Lightweight reachability check used by the health job.
    async fn probe(&self) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError {
    pub kind: FailureKind,
    pub message: String,
}

impl NotifyError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_builder() {
            return Self::permanent(e.to_string());
        }
        match e.status() {
            Some(status) => Self::from_status(status),
            None => Self::transient(e.to_string()),
        }
    }

    /// 408, 429 and 5xx are worth another attempt; any other non-success code
    /// (bad recipient, rejected credentials) will fail the same way again.
    pub fn from_status(status: StatusCode) -> Self {
        let message = format!("gateway returned {status}");
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            Self::transient(message)
        } else {
            Self::permanent(message)
        }
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        };
        write!(f, "notify ({kind}): {}", self.message)
    }
}

impl std::error::Error for NotifyError {}

pub(crate) fn check_response(resp: Result<Response, reqwest::Error>) -> Result<(), NotifyError> {
    let resp = resp.map_err(|e| NotifyError::from_reqwest(&e))?;
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::from_status(status))
    }
}

/// Any answer below 500 proves the gateway is up, even a 4xx for the HEAD.
pub(crate) async fn probe_endpoint(client: &reqwest::Client, url: &str) -> Result<(), NotifyError> {
    let resp = client
        .head(url)
        .send()
        .await
        .map_err(|e| NotifyError::from_reqwest(&e))?;
    if resp.status().is_server_error() {
        Err(NotifyError::from_status(resp.status()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_are_transient() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(NotifyError::from_status(status).is_transient(), "{status}");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            assert_eq!(NotifyError::from_status(status).kind, FailureKind::Permanent);
        }
    }

    #[test]
    fn display_includes_kind() {
        let e = NotifyError::permanent("bad address");
        assert_eq!(e.to_string(), "notify (permanent): bad address");
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let client = reqwest::Client::new();
        let err = probe_endpoint(&client, "http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.is_transient());
    }
}

mod alert;
mod configuration;
mod delivery;

pub use alert::{
    Acknowledgment, Alert, AlertSource, AlertStatus, AlertType, NewAlert, Resolution,
    ResolutionType, Severity,
};
pub use configuration::{AlertConfiguration, ChannelTarget, EscalationTier, RetryPolicy};
pub use delivery::{
    Channel, DeliveryDraft, DeliveryStatus, FailureKind, NotificationDelivery, Tier,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Risk,
    Performance,
    System,
    Compliance,
    Security,
    Financial,
    Operational,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Performance => "performance",
            Self::System => "system",
            Self::Compliance => "compliance",
            Self::Security => "security",
            Self::Financial => "financial",
            Self::Operational => "operational",
        }
    }
}

impl FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "risk" => Ok(Self::Risk),
            "performance" => Ok(Self::Performance),
            "system" => Ok(Self::System),
            "compliance" => Ok(Self::Compliance),
            "security" => Ok(Self::Security),
            "financial" => Ok(Self::Financial),
            "operational" => Ok(Self::Operational),
            _ => Err(ParseEnumError::new("alert type", s)),
        }
    }
}

/// Ordered from least to most urgent so configurations can filter with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MED",
            Self::High => "HIGH",
            Self::Critical => "CRIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Acknowledged)
                | (Self::New, Self::Resolved)
                | (Self::Acknowledged, Self::Resolved)
        )
    }
}

impl FromStr for AlertStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "ACKNOWLEDGED" => Ok(Self::Acknowledged),
            "RESOLVED" => Ok(Self::Resolved),
            _ => Err(ParseEnumError::new("alert status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionType {
    Fixed,
    Workaround,
    Acknowledged,
    FalsePositive,
    Duplicate,
}

impl FromStr for ResolutionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "FIXED" => Ok(Self::Fixed),
            "WORKAROUND" => Ok(Self::Workaround),
            "ACKNOWLEDGED" => Ok(Self::Acknowledged),
            "FALSE_POSITIVE" => Ok(Self::FalsePositive),
            "DUPLICATE" => Ok(Self::Duplicate),
            _ => Err(ParseEnumError::new("resolution type", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSource {
    pub system: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub by: String,
    pub note: Option<String>,
    pub at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolution_type: ResolutionType,
    pub by: String,
    pub note: Option<String>,
    pub at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub category: String,
    pub status: AlertStatus,
    pub source: AlertSource,
    pub risk_score: Option<f64>,
    pub impact_score: Option<f64>,
    pub trigger_condition: Option<String>,
    pub threshold_value: Option<String>,
    pub actual_value: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_team: Option<String>,
    pub acknowledgment: Option<Acknowledgment>,
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub escalated_configurations: Vec<String>,
    pub version: u64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Payload a triggering rule submits; lifecycle fields are assigned on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: AlertSource,
    pub risk_score: Option<f64>,
    pub impact_score: Option<f64>,
    pub trigger_condition: Option<String>,
    pub threshold_value: Option<String>,
    pub actual_value: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_team: Option<String>,
}

impl NewAlert {
    pub fn new(title: impl Into<String>, alert_type: AlertType, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            alert_type,
            severity,
            category: String::new(),
            source: AlertSource::default(),
            risk_score: None,
            impact_score: None,
            trigger_condition: None,
            threshold_value: None,
            actual_value: None,
            assigned_to: None,
            assigned_team: None,
        }
    }

    pub fn into_alert(self, id: String, now_ms: i64) -> Alert {
        Alert {
            id,
            title: self.title,
            description: self.description,
            alert_type: self.alert_type,
            severity: self.severity,
            category: self.category,
            status: AlertStatus::New,
            source: self.source,
            risk_score: self.risk_score,
            impact_score: self.impact_score,
            trigger_condition: self.trigger_condition,
            threshold_value: self.threshold_value,
            actual_value: self.actual_value,
            assigned_to: self.assigned_to,
            assigned_team: self.assigned_team,
            acknowledgment: None,
            resolution: None,
            escalated_configurations: Vec::new(),
            version: 0,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

impl Alert {
    pub fn acknowledged_at_ms(&self) -> Option<i64> {
        self.acknowledgment.as_ref().map(|a| a.at_ms)
    }

    pub fn resolved_at_ms(&self) -> Option<i64> {
        self.resolution.as_ref().map(|r| r.at_ms)
    }

    /// Returns false, leaving the alert untouched, unless it is still NEW.
    pub fn acknowledge(&mut self, by: &str, note: Option<String>, now_ms: i64) -> bool {
        if !self.status.can_transition_to(AlertStatus::Acknowledged) {
            return false;
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledgment = Some(Acknowledgment {
            by: by.to_string(),
            note,
            at_ms: now_ms,
        });
        true
    }

    /// Returns false, leaving the alert untouched, once it is RESOLVED.
    pub fn resolve(
        &mut self,
        by: &str,
        note: Option<String>,
        resolution_type: ResolutionType,
        now_ms: i64,
    ) -> bool {
        if !self.status.can_transition_to(AlertStatus::Resolved) {
            return false;
        }
        self.status = AlertStatus::Resolved;
        self.resolution = Some(Resolution {
            resolution_type,
            by: by.to_string(),
            note,
            at_ms: now_ms,
        });
        true
    }

    pub fn is_escalated_by(&self, configuration_id: &str) -> bool {
        self.escalated_configurations
            .iter()
            .any(|c| c == configuration_id)
    }

    /// Records one escalation per configuration, only while nobody has reacted.
    pub fn mark_escalated(&mut self, configuration_id: &str) -> bool {
        if self.status != AlertStatus::New || self.is_escalated_by(configuration_id) {
            return false;
        }
        self.escalated_configurations
            .push(configuration_id.to_string());
        true
    }

    pub fn escalation_due(&self, deadline_ms: i64, now_ms: i64) -> bool {
        self.status == AlertStatus::New && self.created_at_ms.saturating_add(deadline_ms) < now_ms
    }
}

use std::fmt::Write;

use riskwatch_common::model::{Alert, Severity, Tier};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub alert_id: String,
    pub severity: Severity,
    pub escalated: bool,
    pub subject: String,
    pub body: String,
}

pub fn render(alert: &Alert, tier: Tier) -> RenderedContent {
    let escalated = tier == Tier::Escalation;
    let marker = if escalated { "[ESCALATED] " } else { "" };
    let subject = format!(
        "{marker}[{}] {} ({})",
        alert.severity.tag(),
        alert.title,
        alert.alert_type.as_str()
    );

    let mut body = String::with_capacity(256);
    if escalated {
        let _ = writeln!(body, "This alert is still unacknowledged and has been escalated.");
    }
    let _ = writeln!(body, "Alert: {}", alert.title);
    let _ = writeln!(body, "Id: {}", alert.id);
    let _ = writeln!(body, "Type: {}", alert.alert_type.as_str());
    let _ = writeln!(body, "Severity: {}", alert.severity.as_str());
    if !alert.category.is_empty() {
        let _ = writeln!(body, "Category: {}", alert.category);
    }
    if let Some(system) = &alert.source.system {
        let entity = match (&alert.source.entity_type, &alert.source.entity_id) {
            (Some(t), Some(id)) => format!(" {t}/{id}"),
            (None, Some(id)) => format!(" {id}"),
            _ => String::new(),
        };
        let _ = writeln!(body, "Source: {system}{entity}");
    }
    if let Some(condition) = &alert.trigger_condition {
        let _ = writeln!(body, "Condition: {condition}");
    }
    if let (Some(threshold), Some(actual)) = (&alert.threshold_value, &alert.actual_value) {
        let _ = writeln!(body, "Threshold: {threshold} / Actual: {actual}");
    }
    if let Some(score) = alert.risk_score {
        let _ = writeln!(body, "Risk score: {score:.2}");
    }
    if let Some(score) = alert.impact_score {
        let _ = writeln!(body, "Impact score: {score:.2}");
    }
    if !alert.description.is_empty() {
        let _ = writeln!(body, "\n{}", alert.description);
    }

    RenderedContent {
        alert_id: alert.id.clone(),
        severity: alert.severity,
        escalated,
        subject,
        body,
    }
}

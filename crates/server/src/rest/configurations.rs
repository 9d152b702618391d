use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use riskwatch_common::clock::now_ms;
use riskwatch_common::model::{
    AlertConfiguration, AlertType, ChannelTarget, EscalationTier, RetryPolicy, Severity,
};

use super::alerts::json_body;
use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfigurationRequest {
    pub name: String,
    pub description: Option<String>,
    pub alert_type: AlertType,
    #[serde(default = "yes")]
    pub enabled: bool,
    pub min_severity: Option<Severity>,
    pub channels: Vec<ChannelTarget>,
    pub escalation: Option<EscalationTier>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn yes() -> bool {
    true
}

fn validate(req: &ConfigurationRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    if req.channels.is_empty() {
        return Err(ApiError::bad_request("at least one channel is required"));
    }
    if req.channels.iter().any(|t| t.recipient.trim().is_empty()) {
        return Err(ApiError::bad_request("channel recipients must not be empty"));
    }
    if req.retry.max_attempts == 0 {
        return Err(ApiError::bad_request("retry.max_attempts must be >= 1"));
    }
    if let Some(tier) = &req.escalation {
        if tier.deadline_ms <= 0 || tier.deadline_ms > EscalationTier::MAX_DEADLINE_MS {
            return Err(ApiError::bad_request(format!(
                "escalation.deadline_ms must be between 1 and {}",
                EscalationTier::MAX_DEADLINE_MS
            )));
        }
        if tier.targets.is_empty() {
            return Err(ApiError::bad_request("escalation needs at least one target"));
        }
    }
    Ok(())
}

fn build(id: String, req: ConfigurationRequest, created_at_ms: i64, now: i64) -> AlertConfiguration {
    AlertConfiguration {
        id,
        name: req.name,
        description: req.description,
        alert_type: req.alert_type,
        enabled: req.enabled,
        min_severity: req.min_severity,
        channels: req.channels,
        escalation: req.escalation,
        retry: req.retry,
        created_at_ms,
        updated_at_ms: now,
    }
}

pub async fn list_configurations(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertConfiguration>>, ApiError> {
    Ok(Json(state.configurations.find_all().await?))
}

pub async fn get_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AlertConfiguration>, ApiError> {
    state
        .configurations
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("configuration {id} not found")))
}

pub async fn create_configuration(
    State(state): State<AppState>,
    body: Result<Json<ConfigurationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AlertConfiguration>), ApiError> {
    let req = json_body(body)?;
    validate(&req)?;

    let now = now_ms();
    let configuration = build(uuid::Uuid::new_v4().to_string(), req, now, now);
    state.configurations.save(&configuration).await?;
    tracing::info!(
        configuration_id = %configuration.id,
        alert_type = configuration.alert_type.as_str(),
        channels = configuration.channels.len(),
        "alert configuration created"
    );
    Ok((StatusCode::CREATED, Json(configuration)))
}

pub async fn update_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ConfigurationRequest>, JsonRejection>,
) -> Result<Json<AlertConfiguration>, ApiError> {
    let req = json_body(body)?;
    validate(&req)?;

    let existing = state
        .configurations
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("configuration {id} not found")))?;

    let configuration = build(id, req, existing.created_at_ms, now_ms());
    state.configurations.save(&configuration).await?;
    Ok(Json(configuration))
}

pub async fn delete_configuration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.configurations.delete(&id).await? {
        tracing::info!(configuration_id = %id, "alert configuration deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("configuration {id} not found")))
    }
}

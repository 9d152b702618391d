use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use riskwatch_common::clock::now_ms;
use riskwatch_common::model::{Alert, AlertStatus, NewAlert, NotificationDelivery, ResolutionType};
use riskwatch_common::repository::{Page, PageRequest};

use super::error::ApiError;
use super::AppState;
use crate::middleware::identity::Caller;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub resolution: Option<String>,
    pub resolution_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub new: u64,
    pub acknowledged: u64,
    pub resolved: u64,
    pub active: u64,
    pub total: u64,
}

/// Maps axum's plain-text body rejection onto the JSON error shape.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

pub async fn create_alert(
    State(state): State<AppState>,
    body: Result<Json<NewAlert>, JsonRejection>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    let new_alert = json_body(body)?;
    let now = now_ms();
    let alert = state.engine.alerts().create(new_alert, now).await?;
    state.metrics.inc_alerts_created();

    let engine = state.engine.clone();
    let dispatched = alert.clone();
    state.dispatches.spawn(async move {
        if let Err(e) = engine.dispatch(&dispatched, now_ms()).await {
            tracing::error!(alert_id = %dispatched.id, error = %e, "dispatch failed");
        }
    });

    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<Alert>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<AlertStatus>)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        params.page.unwrap_or(defaults.page),
        params.size.unwrap_or(defaults.size),
    );
    Ok(Json(state.engine.alerts().list(status, page).await?))
}

pub async fn alert_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let counts = state.engine.alerts().stats().await?;
    Ok(Json(StatsResponse {
        new: counts.new,
        acknowledged: counts.acknowledged,
        resolved: counts.resolved,
        active: counts.active(),
        total: counts.total(),
    }))
}

pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.engine.alerts().get(&id).await?))
}

pub async fn alert_deliveries(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NotificationDelivery>>, ApiError> {
    state.engine.alerts().get(&id).await?;
    Ok(Json(state.engine.tracker().for_alert(&id).await?))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<AcknowledgeRequest>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => AcknowledgeRequest::default(),
        Err(e) => return Err(ApiError::bad_request(e.body_text())),
    };

    let t = state
        .engine
        .alerts()
        .acknowledge(&id, &user, req.note, now_ms())
        .await?;
    if t.changed {
        state.metrics.inc_alerts_acknowledged();
    }
    Ok(Json(t.alert))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<String>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let req = json_body(body)?;
    let resolution_type: ResolutionType = req
        .resolution_type
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("resolutionType is required"))?
        .parse()
        .map_err(|e: riskwatch_common::model::ParseEnumError| ApiError::bad_request(e.to_string()))?;

    let t = state
        .engine
        .alerts()
        .resolve(&id, &user, req.resolution, resolution_type, now_ms())
        .await?;
    if t.changed {
        state.metrics.inc_alerts_resolved();
    }
    Ok(Json(t.alert))
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use riskwatch_workers::health::ChannelStatus;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

pub async fn ready() -> StatusCode {
    StatusCode::OK
}

/// Last probe result per channel. Reporting only; dispatch ignores it.
pub async fn channels(State(state): State<AppState>) -> Json<Vec<ChannelStatus>> {
    Json(state.engine.health().snapshot())
}

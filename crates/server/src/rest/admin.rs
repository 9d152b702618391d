use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::alerts::json_body;
use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub identity: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub identity: String,
    pub buckets_removed: usize,
}

/// Drops every bucket held for one IP or user so its quota starts fresh.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    body: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<Json<ResetResponse>, ApiError> {
    let req = json_body(body)?;
    let identity = req.identity.trim().to_string();
    if identity.is_empty() {
        return Err(ApiError::bad_request("identity must not be empty"));
    }
    let buckets_removed = state.admission.reset(&identity);
    Ok(Json(ResetResponse {
        identity,
        buckets_removed,
    }))
}

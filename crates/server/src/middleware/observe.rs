use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use crate::rest::AppState;

/// Request counter and latency summary for every route.
pub async fn observe(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    state.metrics.inc_rest_requests();
    state.metrics.record_rest_latency(started);
    if response.status().is_server_error() {
        state.metrics.inc_rest_errors();
    }
    tracing::debug!(%method, path, status = response.status().as_u16(), "request handled");
    response
}

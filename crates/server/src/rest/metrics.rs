use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::metrics::exposition::{render_prometheus, Gauges};

use super::AppState;

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let gauges = Gauges {
        rate_limit_buckets: state.admission.registry().len() as u64,
        channels_unreachable: state.engine.health().unreachable_count() as u64,
    };
    let body = render_prometheus(&state.metrics, state.engine.metrics(), gauges);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

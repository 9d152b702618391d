use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

use crate::ratelimit::{Decision, EndpointClass};
use crate::rest::error::ApiError;
use crate::rest::AppState;

use super::identity;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Probes and scrapes never consume quota.
pub fn is_exempt(path: &str) -> bool {
    matches!(path, "/healthz" | "/ready" | "/metrics")
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.rate_limit_enabled || is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let class = EndpointClass::classify(request.uri().path());
    let who = identity::resolve(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        &state.admission.policy().trusted_proxies,
    );
    let decision = state.admission.admit_request(&who, class);

    if !decision.is_allowed() {
        tracing::info!(
            ip = who.ip.as_deref().unwrap_or("-"),
            user = who.user.as_deref().unwrap_or("-"),
            class = class.as_str(),
            "request rejected by rate limit"
        );
        return too_many_requests(&decision);
    }

    let mut response = next.run(request).await;
    set_headers(response.headers_mut(), &decision);
    response
}

fn too_many_requests(decision: &Decision) -> Response {
    let mut response = ApiError::new(
        axum::http::StatusCode::TOO_MANY_REQUESTS,
        "Rate limit exceeded",
        decision.message(),
    )
    .into_response();
    let headers = response.headers_mut();
    set_headers(headers, decision);
    let retry_after = decision.retry_after.as_secs_f64().ceil().max(1.0) as u64;
    headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn set_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    let reset_secs = (decision.reset_at_ms + 999).div_euclid(1_000);
    headers.insert(RESET_HEADER, HeaderValue::from(reset_secs));
}

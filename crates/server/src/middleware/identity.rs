use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

use crate::ratelimit::RequestIdentity;
use crate::rest::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
/// With a non-empty `trusted` list the headers only count when the peer is
/// one of those proxies.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> Option<String> {
    let peer_ip = peer.map(|addr| addr.ip());
    let believe_headers = trusted.is_empty() || peer_ip.is_some_and(|ip| trusted.contains(&ip));
    if !believe_headers {
        return peer_ip.map(|ip| ip.to_string());
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    let real = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real {
        return Some(ip.to_string());
    }

    peer_ip.map(|ip| ip.to_string())
}

/// The user id an upstream auth layer attached to the request.
pub fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn resolve(
    parts_headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trusted: &[IpAddr],
) -> RequestIdentity {
    RequestIdentity {
        ip: client_ip(parts_headers, peer.map(|c| c.0), trusted),
        user: user_id(parts_headers),
    }
}

/// Extracts the caller for operations that record who acted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(&parts.headers)
            .map(Caller)
            .ok_or_else(|| ApiError::unauthorized("X-User-Id header is required"))
    }
}

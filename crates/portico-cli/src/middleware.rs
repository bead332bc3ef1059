//! HTTP middleware for request identification, authentication, rate limiting
//! and logging.
//!
//! Layer order in [`crate::routes::create_router`] makes these run as:
//! request id → logging → auth → rate limit → handler.

use crate::{AppState, GatewayError};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use portico_core::{Decision, API_KEY_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Paths served without credentials or rate limiting
pub const PUBLIC_PATHS: [&str; 1] = ["/health"];

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request identity and start time
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub id: String,
    pub started: Instant,
}

/// Source IP of the caller, as seen by the rate limiter
#[derive(Clone, Debug)]
pub struct ClientIp(pub String);

/// Check if a path bypasses auth and rate limiting
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// Request ID middleware - adds x-request-id header and starts the clock
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let context = RequestContext {
        id: uuid::Uuid::new_v4().to_string(),
        started: Instant::now(),
    };
    let request_id = context.id.clone();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, GatewayError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    // A header that is present but not valid UTF-8 counts as a wrong key
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|h| h.to_str().unwrap_or_default());

    let authorized = state
        .guard
        .authorize(presented)
        .map_err(|e| GatewayError::from_auth(e, request.method(), request.uri().path()))?;

    request.extensions_mut().insert(authorized);

    Ok(next.run(request).await)
}

/// Rate limiting middleware
///
/// Every request reaching this layer is counted against its source IP, and
/// every response leaving it carries the quota headers.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let client_ip = client_ip(&request);
    let decision = state.rate_limiter.check(&client_ip, Utc::now());

    let mut response = if decision.allowed {
        request.extensions_mut().insert(ClientIp(client_ip));
        next.run(request).await
    } else {
        tracing::warn!(
            client = %client_ip,
            path = %request.uri().path(),
            retry_after_secs = decision.retry_after_secs,
            "Rate limit exceeded"
        );
        GatewayError::RateLimited {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            limit: decision.limit,
            retry_after_secs: decision.retry_after_secs,
        }
        .into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Write the `X-RateLimit-*` headers for a decision
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(decision.remaining));
    let reset = decision
        .reset_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(RATE_LIMIT_RESET_HEADER, value);
    }
}

/// Source IP from the connection, or `unknown` when not served over TCP
pub fn client_ip(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}

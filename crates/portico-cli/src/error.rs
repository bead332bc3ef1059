//! Error types and gateway error codes

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use portico_core::AuthError;
use serde_json::{json, Value};
use thiserror::Error;

/// Header naming the error code on every gateway-generated error
pub const ERROR_CODE_HEADER: &str = "x-gateway-error";

/// Gateway error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthorized,
    TooManyRequests,
    RouteNotFound,
    BadGateway,
    InternalError,
}

impl ErrorCode {
    /// Get the error code string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::TooManyRequests => "Too Many Requests",
            Self::RouteNotFound => "Route not found",
            Self::BadGateway => "Bad Gateway",
            Self::InternalError => "Internal Server Error",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Terminal pipeline failures, each rendered as a complete client response
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API key is required")]
    Unauthenticated { method: Method, path: String },

    #[error("Invalid API key")]
    Forbidden { method: Method, path: String },

    #[error("Rate limit exceeded, retry in {retry_after_secs} seconds")]
    RateLimited {
        method: Method,
        path: String,
        limit: u32,
        retry_after_secs: u64,
    },

    #[error("No route configured for {method} {path}")]
    RouteNotFound {
        method: Method,
        path: String,
        available_routes: Vec<String>,
    },

    #[error("Upstream service at {target} is unavailable: {reason}")]
    UpstreamUnavailable {
        method: Method,
        target: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Convert a credential failure, keeping the request context
    pub fn from_auth(err: AuthError, method: &Method, path: &str) -> Self {
        let method = method.clone();
        let path = path.to_string();
        match err {
            AuthError::Unauthenticated => Self::Unauthenticated { method, path },
            AuthError::Forbidden => Self::Forbidden { method, path },
        }
    }

    /// Get the error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated { .. } | Self::Forbidden { .. } => ErrorCode::Unauthorized,
            Self::RateLimited { .. } => ErrorCode::TooManyRequests,
            Self::RouteNotFound { .. } => ErrorCode::RouteNotFound,
            Self::UpstreamUnavailable { .. } => ErrorCode::BadGateway,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    fn body(&self) -> Value {
        let code = self.error_code();
        let mut body = json!({
            "error": code.as_str(),
            "message": self.to_string(),
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });

        let extra = match self {
            Self::Unauthenticated { method, path } | Self::Forbidden { method, path } => {
                json!({ "method": method.as_str(), "path": path })
            }
            Self::RateLimited {
                method,
                path,
                limit,
                retry_after_secs,
            } => json!({
                "method": method.as_str(),
                "path": path,
                "limit": limit,
                "retryAfter": retry_after_secs,
            }),
            Self::RouteNotFound {
                method,
                path,
                available_routes,
            } => json!({
                "method": method.as_str(),
                "path": path,
                "availableRoutes": available_routes,
            }),
            Self::UpstreamUnavailable { method, target, .. } => json!({
                "method": method.as_str(),
                "target": target,
            }),
            Self::Internal(_) => json!({}),
        };

        if let (Value::Object(body), Value::Object(extra)) = (&mut body, extra) {
            body.extend(extra);
        }
        body
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let code = self.error_code();

        match &self {
            Self::Internal(message) => tracing::error!(error = %message, "Internal gateway error"),
            Self::UpstreamUnavailable { target, reason, .. } => {
                tracing::warn!(upstream = %target, reason = %reason, "Upstream request failed")
            }
            _ => tracing::debug!(code = code.as_str(), "Request rejected: {}", self),
        }

        let mut response = (code.status_code(), Json(self.body())).into_response();
        response.headers_mut().insert(
            ERROR_CODE_HEADER,
            HeaderValue::from_static(code.as_str()),
        );

        if let Self::RateLimited {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthenticated_and_forbidden_differ() {
        let missing = GatewayError::from_auth(AuthError::Unauthenticated, &Method::GET, "/api/x");
        let wrong = GatewayError::from_auth(AuthError::Forbidden, &Method::GET, "/api/x");

        let missing = missing.into_response();
        let wrong = wrong.into_response();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let missing = body_json(missing).await;
        let wrong = body_json(wrong).await;
        assert_eq!(missing["error"], "Unauthorized");
        assert_eq!(missing["message"], "API key is required");
        assert_eq!(wrong["message"], "Invalid API key");
        assert_eq!(wrong["path"], "/api/x");
        assert!(wrong["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_rate_limited_response() {
        let err = GatewayError::RateLimited {
            method: Method::POST,
            path: "/api/orders".to_string(),
            limit: 10,
            retry_after_secs: 42,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()[ERROR_CODE_HEADER], "Too Many Requests");

        let body = body_json(response).await;
        assert_eq!(body["retryAfter"], 42);
        assert_eq!(body["method"], "POST");
    }

    #[tokio::test]
    async fn test_route_not_found_lists_routes() {
        let err = GatewayError::RouteNotFound {
            method: Method::GET,
            path: "/nope".to_string(),
            available_routes: vec!["/b".to_string(), "/a".to_string()],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["availableRoutes"], json!(["/b", "/a"]));
        assert_eq!(body["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_upstream_unavailable() {
        let err = GatewayError::UpstreamUnavailable {
            method: Method::GET,
            target: "http://127.0.0.1:1/x".to_string(),
            reason: "connection refused".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["target"], "http://127.0.0.1:1/x");
        assert_eq!(body["error"], "Bad Gateway");
    }
}

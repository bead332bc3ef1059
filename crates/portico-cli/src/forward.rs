//! Upstream request forwarding

use crate::GatewayError;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};
use bytes::Bytes;
use serde_json::Value;
use std::time::Instant;
use tracing::instrument;

/// Identifies the gateway on proxied responses
pub const GATEWAY_HEADER: &str = "x-gateway";
/// Milliseconds spent handling the request, e.g. `12ms`
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";
/// Gateway name, sent upstream
pub const FORWARDED_BY_HEADER: &str = "x-forwarded-by";
/// Original client IP, sent upstream
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Caller credential, sent upstream
pub const FORWARDED_API_KEY_HEADER: &str = "x-forwarded-api-key";

/// Headers that describe a single connection and must not be relayed
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// An outbound request to a resolved backend
#[derive(Debug)]
pub struct ForwardRequest<'a> {
    /// Full upstream URL
    pub url: String,
    /// Client method
    pub method: Method,
    /// Client headers
    pub headers: &'a HeaderMap,
    /// Client body
    pub body: Bytes,
    /// Client source IP
    pub client_ip: &'a str,
    /// Accepted credential
    pub api_key: &'a str,
}

/// A fully read upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Upstream status code
    pub status: StatusCode,
    /// Upstream headers, hop-by-hop headers removed
    pub headers: HeaderMap,
    /// Upstream body
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Parse the body as JSON, if it is JSON
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Relay to the client with gateway and timing headers
    pub fn into_response(self, gateway_name: &HeaderValue, started: Instant) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        let headers = response.headers_mut();
        headers.insert(GATEWAY_HEADER, gateway_name.clone());
        let elapsed = format!("{}ms", started.elapsed().as_millis());
        if let Ok(value) = HeaderValue::from_str(&elapsed) {
            headers.insert(RESPONSE_TIME_HEADER, value);
        }

        response
    }
}

/// Issues exactly one upstream call per request
pub struct Forwarder {
    client: reqwest::Client,
    gateway_name: HeaderValue,
}

impl Forwarder {
    /// Create a forwarder identifying itself as `gateway_name`
    pub fn new(gateway_name: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            gateway_name: HeaderValue::from_str(gateway_name)?,
        })
    }

    /// Value of the `x-gateway` header
    pub fn gateway_name(&self) -> &HeaderValue {
        &self.gateway_name
    }

    /// Perform the upstream call
    ///
    /// Any status the backend returns is relayed; only transport failures
    /// become `UpstreamUnavailable`.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn forward(&self, request: ForwardRequest<'_>) -> Result<UpstreamResponse, GatewayError> {
        let headers = self.upstream_headers(&request);
        let method = request.method.clone();
        let url = request.url;

        let unavailable = |reason: String| GatewayError::UpstreamUnavailable {
            method: method.clone(),
            target: url.clone(),
            reason,
        };

        let response = self
            .client
            .request(request.method.clone(), url.as_str())
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| unavailable(describe(&e)))?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers().clone());
        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(describe(&e)))?;

        tracing::debug!(status = %status.as_u16(), size = body.len(), "Upstream responded");

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    fn upstream_headers(&self, request: &ForwardRequest<'_>) -> HeaderMap {
        let mut headers = strip_hop_by_hop(request.headers.clone());
        headers.remove(axum::http::header::HOST);

        headers.insert(FORWARDED_BY_HEADER, self.gateway_name.clone());
        if let Ok(value) = HeaderValue::from_str(request.client_ip) {
            headers.insert(FORWARDED_FOR_HEADER, value);
        }
        if let Ok(value) = HeaderValue::from_str(request.api_key) {
            headers.insert(FORWARDED_API_KEY_HEADER, value);
        }
        headers
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
    headers
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

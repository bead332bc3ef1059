//! Proxy handler: cache check, route resolution, forwarding, cache fill

use crate::forward::ForwardRequest;
use crate::middleware::{ClientIp, RequestContext};
use crate::{AppState, GatewayError};
use axum::{
    extract::{Extension, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use portico_core::{Authorized, CacheKey};
use std::sync::Arc;
use tracing::debug;

/// Fallback handler for every path not served by the gateway itself
///
/// Runs after auth and rate limiting. GET requests are answered from the
/// cache when possible; everything else is resolved against the route table
/// and forwarded once. A 200 GET with a JSON body is cached afterwards.
#[allow(clippy::too_many_arguments)]
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Authorized>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    Extension(context): Extension<RequestContext>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let cache_key = (method == Method::GET)
        .then(|| CacheKey::new(method.as_str(), path_and_query, &auth.api_key));

    if let Some(key) = &cache_key {
        if let Some(hit) = state.cache.lookup(key, Utc::now()) {
            debug!(path = %path_and_query, stored_at = %hit.stored_at, "Cache hit");
            return Ok(Json(hit.annotated_body()).into_response());
        }
    }

    let url = match state.routes.resolve(path_and_query) {
        Some(route) => {
            debug!(
                prefix = %route.entry.prefix,
                rewritten = %route.rewritten_path,
                "Route resolved"
            );
            route.upstream_url()
        }
        None => {
            return Err(GatewayError::RouteNotFound {
                method,
                path: uri.path().to_string(),
                available_routes: state.routes.prefixes(),
            })
        }
    };

    let upstream = state
        .forwarder
        .forward(ForwardRequest {
            url,
            method: method.clone(),
            headers: &headers,
            body,
            client_ip: &client_ip,
            api_key: &auth.api_key,
        })
        .await?;

    if let Some(key) = cache_key {
        if upstream.status == StatusCode::OK {
            match upstream.json_body() {
                Some(json) => {
                    state.cache.store(key, json, Utc::now());
                }
                None => debug!(path = %path_and_query, "Upstream body is not JSON, not caching"),
            }
        }
    }

    Ok(upstream.into_response(state.forwarder.gateway_name(), context.started))
}

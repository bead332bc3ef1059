//! Gateway-level endpoints (health, stats)

use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// GET /health - Liveness and configured routes, no credentials required
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "routes": state.routes.prefixes(),
    }))
}

/// GET /gateway/stats - Store sizes, effective configuration, memory use
pub async fn gateway_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let routes: Map<String, Value> = state
        .routes
        .entries()
        .iter()
        .map(|r| (r.prefix.clone(), Value::String(r.base().to_string())))
        .collect();

    let memory = match process_memory() {
        Some((rss, virtual_bytes)) => json!({ "rss": rss, "virtual": virtual_bytes }),
        None => Value::Null,
    };

    Json(json!({
        "activeConnections": state.rate_limiter.len(),
        "cacheSize": state.cache.len(),
        "configuration": {
            "routes": routes,
            "rateLimit": {
                "windowMs": state.rate_limiter.window().num_milliseconds(),
                "maxRequests": state.rate_limiter.limit(),
            },
            "cache": {
                "ttlMs": state.cache.ttl().num_milliseconds(),
                "maxEntries": state.cache.max_entries(),
            },
        },
        "memory": memory,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// Resident and virtual memory of this process, in bytes
fn process_memory() -> Option<(u64, u64)> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );
    system
        .process(pid)
        .map(|p| (p.memory(), p.virtual_memory()))
}

//! Application state

use crate::config::GatewayConfig;
use crate::forward::Forwarder;
use portico_core::{ApiKeyGuard, RateLimiter, ResponseCache, RouteTable};
use std::time::Instant;
use tracing::info;

/// Application state shared across handlers
///
/// Built once at startup. The route table and config are read-only; the rate
/// limiter and response cache synchronize internally.
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Prefix routing table
    pub routes: RouteTable,
    /// API key check
    pub guard: ApiKeyGuard,
    /// Per-client request counters
    pub rate_limiter: RateLimiter,
    /// GET response cache
    pub cache: ResponseCache,
    /// Upstream HTTP client
    pub forwarder: Forwarder,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: GatewayConfig, routes: RouteTable) -> anyhow::Result<Self> {
        let guard = ApiKeyGuard::new(&config.api_key);
        let rate_limiter = RateLimiter::new(config.rate_limit)?;
        let cache = ResponseCache::new(config.cache)?;
        let forwarder = Forwarder::new(&config.gateway_name)?;

        for route in routes.entries() {
            info!(prefix = %route.prefix, backend = %route.target, "Route registered");
        }
        info!(
            window_secs = config.rate_limit.window_secs,
            max_requests = config.rate_limit.max_requests,
            cache_ttl_secs = config.cache.ttl_secs,
            cache_max_entries = config.cache.max_entries,
            "Gateway policies loaded"
        );

        Ok(Self {
            config,
            routes,
            guard,
            rate_limiter,
            cache,
            forwarder,
            started_at: Instant::now(),
        })
    }
}

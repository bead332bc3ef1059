//! Portico Gateway - reverse-proxy API gateway

use clap::Parser;
use portico_cli::{run_server_with_shutdown, shutdown_signal, GatewayConfig};
use portico_core::{CacheConfig, RateLimitConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "portico-gateway")]
#[command(about = "Reverse-proxy API gateway with auth, rate limiting and response caching")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Expected x-api-key value
    #[arg(long, default_value = "gateway-secret-key", env = "API_KEY", hide_env_values = true)]
    api_key: String,

    /// JSON file mapping route prefixes to backend URLs
    #[arg(long, default_value = "config/routes.json", env = "ROUTES_FILE")]
    routes_file: PathBuf,

    /// Rate limit window in seconds
    #[arg(long, default_value = "60", env = "RATE_LIMIT_WINDOW_SECS")]
    rate_limit_window_secs: u64,

    /// Requests allowed per client per window
    #[arg(long, default_value = "10", env = "RATE_LIMIT_MAX_REQUESTS")]
    rate_limit_max_requests: u32,

    /// Cached GET response lifetime in seconds
    #[arg(long, default_value = "30", env = "CACHE_TTL_SECS")]
    cache_ttl_secs: u64,

    /// Cache size that triggers eviction
    #[arg(long, default_value = "100", env = "CACHE_MAX_ENTRIES")]
    cache_max_entries: usize,

    /// Entries evicted when the cache overflows
    #[arg(long, default_value = "10", env = "CACHE_EVICT_BATCH")]
    cache_evict_batch: usize,

    /// Enable debug logging
    #[arg(short, long, env = "PORTICO_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("portico_cli={log_level},portico_core={log_level},tower_http=debug").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.api_key == "gateway-secret-key" {
        tracing::warn!("⚠️  Using the default API key - set API_KEY for anything but local testing");
    }

    // Build configuration
    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        api_key: args.api_key,
        routes_file: args.routes_file,
        rate_limit: RateLimitConfig {
            window_secs: args.rate_limit_window_secs,
            max_requests: args.rate_limit_max_requests,
        },
        cache: CacheConfig {
            ttl_secs: args.cache_ttl_secs,
            max_entries: args.cache_max_entries,
            evict_batch: args.cache_evict_batch,
        },
        ..Default::default()
    };

    // Route configuration is required; a bad file stops startup
    let routes = config.load_routes()?;
    tracing::info!(
        "Loaded {} routes from {}",
        routes.len(),
        config.routes_file.display()
    );

    run_server_with_shutdown(config, routes, shutdown_signal()).await
}

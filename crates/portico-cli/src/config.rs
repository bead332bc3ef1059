//! Gateway configuration

use anyhow::Context;
use portico_core::{CacheConfig, RateLimitConfig, RouteTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Expected value of the `x-api-key` header
    pub api_key: String,
    /// JSON file mapping route prefixes to backend URLs
    pub routes_file: PathBuf,
    /// Value of the `x-gateway` and `x-forwarded-by` headers
    pub gateway_name: String,
    /// Per-client request limit
    pub rate_limit: RateLimitConfig,
    /// GET response cache policy
    pub cache: CacheConfig,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: "gateway-secret-key".to_string(),
            routes_file: PathBuf::from("config/routes.json"),
            gateway_name: "portico-gateway".to_string(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            max_body_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Read and validate the route table from `routes_file`
    pub fn load_routes(&self) -> anyhow::Result<RouteTable> {
        load_routes(&self.routes_file)
    }
}

/// Read a `prefix -> URL` JSON file, keeping declaration order
pub fn load_routes(path: &Path) -> anyhow::Result<RouteTable> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read route configuration {}", path.display()))?;

    let routes = RouteTable::from_json(&contents)
        .with_context(|| format!("invalid route configuration {}", path.display()))?;

    if routes.is_empty() {
        tracing::warn!(path = %path.display(), "Route configuration is empty, every proxied request will 404");
    }

    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_routes_keeps_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"/api/users": "http://localhost:5001", "/api/orders": "http://localhost:5002"}}"#
        )
        .unwrap();

        let config = GatewayConfig {
            routes_file: file.path().to_path_buf(),
            ..Default::default()
        };
        let routes = config.load_routes().unwrap();
        assert_eq!(routes.prefixes(), vec!["/api/users", "/api/orders"]);
    }

    #[test]
    fn test_load_routes_failures() {
        assert!(load_routes(Path::new("/nonexistent/routes.json")).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"/api": 42}}"#).unwrap();
        let err = load_routes(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("/api"));
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.api_key, "gateway-secret-key");
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.cache.ttl_secs, 30);
    }
}

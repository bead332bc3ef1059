//! # Portico Core
//!
//! Decision components for the Portico reverse-proxy gateway.
//!
//! This crate provides:
//! - **Routing**: ordered prefix table resolving paths to backend services
//! - **Rate Limiting**: per-client fixed-window counters
//! - **Response Caching**: short-TTL, size-bounded store for GET responses
//! - **Credential Checks**: API key validation
//!
//! Every stateful operation takes an explicit `now`, so the server crate owns
//! the clock and tests can drive time directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Gateway Pipeline (cli)          │
//! ├──────────┬─────────────┬────────────────┤
//! │ ApiKey   │ RateLimiter │ ResponseCache  │
//! │ Guard    │ (DashMap)   │ (Mutex + LRU)  │
//! ├──────────┴─────────────┴────────────────┤
//! │              RouteTable                 │
//! └─────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod route;

pub use auth::{ApiKeyGuard, AuthError, Authorized, API_KEY_HEADER};
pub use cache::{CacheConfig, CacheKey, CachedResponse, ResponseCache};
pub use error::{CoreError, Result};
pub use rate_limit::{Decision, RateLimitConfig, RateLimiter};
pub use route::{ResolvedRoute, RouteEntry, RouteTable};

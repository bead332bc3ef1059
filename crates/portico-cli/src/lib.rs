//! # Portico Gateway
//!
//! Reverse-proxy API gateway in front of a set of backend services.
//!
//! This crate provides:
//! - **Authentication**: `x-api-key` validation on every non-public path
//! - **Rate Limiting**: per-source-IP fixed windows with `X-RateLimit-*` headers
//! - **Response Caching**: short-lived cache for successful GET responses
//! - **Proxying**: prefix routing and single-attempt forwarding via reqwest
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                   Portico Gateway                   │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Logging │ Auth │ Rate Limiter         │
//! ├─────────────────────────────────────────────────────┤
//! │  Proxy handler: Cache → Route Table → Forwarder     │
//! ├─────────────────────────────────────────────────────┤
//! │                  portico-core                       │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                 Backend services                    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ErrorCode, GatewayError};
pub use forward::Forwarder;
pub use server::{run_server, run_server_with_shutdown, shutdown_signal};
pub use state::AppState;

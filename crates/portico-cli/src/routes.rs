//! HTTP route definitions

use crate::{handlers, middleware, AppState, GatewayError};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
///
/// `/health` and `/gateway/stats` are served by the gateway; every other path
/// falls through to the proxy handler.
pub fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/gateway/stats", get(handlers::gateway_stats))
        .fallback(handlers::proxy);

    with_gateway_layers(routes, state)
}

/// Wrap routes in the gateway middleware stack
fn with_gateway_layers(routes: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin)
        .expose_headers(AnyOrigin);

    routes
        // Innermost first: the last layer added runs first
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ))
        // Wraps auth and rate limiting too
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    GatewayError::Internal(format!("request handler panicked: {detail}")).into_response()
}

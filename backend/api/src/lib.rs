pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod rate_limit;
pub mod request_middleware;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

use axum::{middleware, Router};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::rate_limit::RateLimitState;
use crate::state::AppState;

/// The assembled service: every route plus panic recovery, request logging
/// and rate limiting. CORS is left to the binary.
pub fn app(state: AppState, rate_limiter: RateLimitState) -> Router {
    routes::api_router()
        .layer(CatchPanicLayer::custom(request_middleware::handle_panic))
        .layer(middleware::from_fn(request_middleware::request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit::rate_limit_middleware,
        ))
        .with_state(state)
}

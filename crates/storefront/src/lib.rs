//! Perfumeria storefront library.
//!
//! The server-rendered storefront as a library, so the router can be built
//! by the binary and exercised by tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::State, http::StatusCode, middleware::from_fn, routing::get};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionManagerLayer;

use crate::middleware::{
    csp_nonce_middleware, maintenance_middleware, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Build the full application router.
///
/// Layer order, outermost first: request tracing, request ID, CSP nonce,
/// security headers, session, maintenance mode. Sentry layers are added by
/// the binary around the result.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: tower_sessions::SessionStore + Clone,
{
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            maintenance_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if db::ping(state.pool()).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

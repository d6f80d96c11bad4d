//! Diya storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;

use axum::{Router, routing::get};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the storefront application router.
///
/// Everything except the Sentry tower layers, which only make sense with a
/// live transport and are added in `main`.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

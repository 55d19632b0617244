// src/handlers/mod.rs
pub mod generate;
pub mod status;

use crate::middleware::logging::request_logging_middleware;
use crate::AppState;
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// The full relay application: routes, request logging, permissive CORS for a
/// page served from another origin, and the shared state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(generate::generate_routes())
        .merge(status::status_routes())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

// src/handlers/status.rs
use crate::AppState;
use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let groq_status = if state.provider.is_configured() { "configured" } else { "not_configured" };

    Json(json!({
        "status": "operational",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.provider.model(),
        "services": {
            "groq": groq_status
        },
        "endpoints": {
            "generate": ["/generate-code", "/api/generate-code"],
            "status": "/api/status"
        }
    }))
}

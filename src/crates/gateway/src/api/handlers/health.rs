//! Health check endpoint handlers

use axum::Json;
use serde_json::{json, Value};

use crate::api::models::HealthResponse;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::new("ok", env!("CARGO_PKG_VERSION")))
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({}))
}

//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};
use llm::ModelProvider;
use resolver::{Pipeline, StepOrchestrator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::api::{handlers, middleware};
use crate::auth::ApiKeyValidator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub orchestrator: StepOrchestrator,
    /// Builds the caller's chat model per request
    pub models: Arc<dyn ModelProvider>,
    pub auth: Arc<dyn ApiKeyValidator>,
    /// Cancelled on server shutdown; deep runs stop before their next step
    pub shutdown: CancellationToken,
}

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/run/identify-endpoints", post(handlers::identify_endpoints))
        .route("/run/action", post(handlers::run_action))
        .route("/run/deep", post(handlers::run_deep))
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer())
        .with_state(state)
}

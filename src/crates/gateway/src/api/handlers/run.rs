//! Pipeline endpoint handlers
//!
//! Every handler checks the `api-key` header before reading the body,
//! building a model or touching the pipeline.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use llm::ChatModel;
use std::sync::Arc;
use tracing::info;

use crate::api::{
    error::{ApiError, ApiResult},
    models::{
        DeepRequest, DeepResponse, IdentifyEndpointsRequest, IdentifyEndpointsResponse,
        LlmConfig, RunActionRequest, RunActionResponse,
    },
    routes::AppState,
};
use crate::auth::{AuthDecision, API_KEY_HEADER};

/// POST /run/identify-endpoints
pub async fn identify_endpoints(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<IdentifyEndpointsRequest>, JsonRejection>,
) -> ApiResult<Json<IdentifyEndpointsResponse>> {
    let caller = authorize(&state, &headers).await?;
    let Json(req) = payload?;
    req.validate()?;
    let model = build_model(&state, &req.llm_config)?;

    let query = req.to_query();
    let identified = state
        .pipeline
        .identify_endpoints(model.as_ref(), &query)
        .await?;

    info!(
        %caller,
        integration = %query.integration_id,
        endpoints = identified.endpoints.len(),
        "Identified endpoints"
    );
    Ok(Json(IdentifyEndpointsResponse::new(identified, query.api_base())))
}

/// POST /run/action
pub async fn run_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RunActionRequest>, JsonRejection>,
) -> ApiResult<Json<RunActionResponse>> {
    let caller = authorize(&state, &headers).await?;
    let Json(req) = payload?;
    req.validate()?;
    let model = build_model(&state, &req.llm_config)?;

    let result = state.pipeline.run_action(model.as_ref(), &req.to_query()).await?;

    info!(%caller, integration = %req.integration_id, status = "completed", "Action run");
    Ok(Json(RunActionResponse::from(result)))
}

/// POST /run/deep
///
/// A failing step still answers 200; the body carries the failure and the
/// steps that completed before it.
pub async fn run_deep(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<DeepRequest>, JsonRejection>,
) -> ApiResult<Json<DeepResponse>> {
    let caller = authorize(&state, &headers).await?;
    let Json(req) = payload?;
    req.validate()?;
    let model = build_model(&state, &req.llm_config)?;

    let cancel = state.shutdown.child_token();
    let outcome = state
        .orchestrator
        .run(model.as_ref(), &req.to_query(), &cancel)
        .await?;

    info!(
        %caller,
        planned = outcome.steps.len(),
        completed = outcome.transcript.len(),
        complete = outcome.is_complete(),
        "Deep run"
    );
    Ok(Json(DeepResponse::from(outcome)))
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<String> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", API_KEY_HEADER)))?;

    match state.auth.validate(key).await {
        AuthDecision::Allowed { key_name } => Ok(key_name),
        AuthDecision::UnknownKey => Err(ApiError::Unauthorized("invalid api key".into())),
        AuthDecision::RateLimited { limit } => Err(ApiError::RateLimited(format!(
            "your rate limit of {} requests per month has been exhausted for this month",
            limit
        ))),
    }
}

fn build_model(state: &AppState, config: &LlmConfig) -> ApiResult<Arc<dyn ChatModel>> {
    Ok(state.models.model_for(&config.llm, &config.llm_api_key)?)
}

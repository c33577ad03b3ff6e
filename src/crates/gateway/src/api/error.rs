//! API error types and HTTP response conversion
//!
//! Resolver failures are mapped to status codes here, so handlers can use `?`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use resolver::{ExecutionError, ResolverError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Model output or request content could not be turned into a call
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Target API or language model failed
    #[error("Upstream failure: {0}")]
    BadGateway(String),

    /// Request body is not valid JSON for the endpoint
    #[error("Invalid request body: {0}")]
    JsonError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::JsonError(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::JsonError(_) => "JSON_ERROR",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Unprocessable(_) => "Unprocessable",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::RateLimited(_) => "RateLimited",
            ApiError::BadGateway(_) => "BadGateway",
            ApiError::JsonError(_) => "JsonError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse::new(self.error_type(), self.to_string(), self.code());

        if status.is_server_error() {
            tracing::error!("API Error: {:?}", body);
        } else {
            tracing::warn!("API Error: {:?}", body);
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::JsonError(rejection.body_text())
    }
}

impl From<llm::LlmError> for ApiError {
    fn from(err: llm::LlmError) -> Self {
        use llm::LlmError;
        match err {
            LlmError::ApiKeyNotFound(_) | LlmError::ModelNotFound(_) | LlmError::ConfigError(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ref e if e.is_auth_error() => ApiError::BadRequest(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::NoMatchingEndpoint { .. } => ApiError::NotFound(err.to_string()),
            ResolverError::UnknownIntegration(_) => ApiError::BadRequest(err.to_string()),
            ResolverError::Synthesis(_)
            | ResolverError::Schema(_)
            | ResolverError::Selection(_)
            | ResolverError::Decomposition(_) => ApiError::Unprocessable(err.to_string()),
            ResolverError::Execution(ref exec) => match exec {
                ExecutionError::UnsupportedMethod(_) => ApiError::Unprocessable(err.to_string()),
                ExecutionError::InvalidHeader(_) => ApiError::BadRequest(err.to_string()),
                ExecutionError::InvalidPathValue { .. } => ApiError::Unprocessable(err.to_string()),
                _ => ApiError::BadGateway(err.to_string()),
            },
            ResolverError::Llm(llm_err) => llm_err.into(),
        }
    }
}

//! REST API layer
//!
//! - `POST /run/identify-endpoints` - candidate endpoints for a query
//! - `POST /run/action` - resolve, execute and answer one query
//! - `POST /run/deep` - multi-step runs across integrations
//! - `GET /health` - liveness, no credential needed

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState};

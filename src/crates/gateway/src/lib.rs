//! HTTP surface for kramen
//!
//! Wires the resolver pipeline and step orchestrator behind an axum router,
//! with per-key authentication and monthly quotas in front of every run.
//!
//! # Modules
//!
//! - `api` - routes, handlers, request/response bodies and error mapping
//! - `auth` - the `ApiKeyValidator` collaborator and its static implementation
//! - `config` - `gateway.toml` loading with environment overrides

pub mod api;
pub mod auth;
pub mod config;

pub use api::{create_router, ApiError, AppState};
pub use auth::{ApiKeyValidator, AuthDecision, StaticKeyValidator};
pub use config::{GatewayConfig, GatewayConfigError};

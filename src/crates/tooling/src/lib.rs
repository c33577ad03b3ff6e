//! Shared utilities for the kramen workspace
//!
//! # Modules
//!
//! - `config` - Environment variable loading and the `ConfigBuilder` trait
//! - `async_utils` - Retry policies and timeout wrappers for async operations
//! - `logging` - Tracing subscriber setup and timing helpers

pub mod async_utils;
pub mod config;
pub mod logging;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// General error with message
    #[error("Tooling error: {0}")]
    General(String),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;

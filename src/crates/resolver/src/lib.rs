//! Query resolution and action execution for kramen
//!
//! Turns a natural-language request into an executed call against an indexed
//! third-party HTTP API and a synthesized answer.
//!
//! # Modules
//!
//! - `schema` - canonical schema trees for parameter and body specifications
//! - `index` - semantic index clients (Qdrant, in-memory)
//! - `retriever` - candidate endpoint lookup that degrades to nothing
//! - `agents` - structured-completion stages (rephrase, filter, synthesize, answer, decompose, select)
//! - `executor` - the outbound HTTP call
//! - `toolset` - lookup tools offered to the synthesizers
//! - `pipeline` - the single-step pipeline
//! - `orchestrator` - multi-step runs over a transcript

pub mod agents;
pub mod executor;
pub mod index;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod retriever;
pub mod schema;
pub mod toolset;
pub mod types;

use thiserror::Error;

pub use executor::{ActionExecutor, ActionRequest, ActionResponse, ExecutionError, HttpMethod};
pub use index::{InMemoryIndex, IndexError, QdrantConfig, QdrantIndex, SemanticIndex};
pub use orchestrator::{
    DeepOutcome, DeepQuery, StepFailure, StepOrchestrator, StepRecord, StepState, Transcript,
};
pub use pipeline::{Pipeline, PipelineSettings, ResolvedAction};
pub use registry::{InMemoryRegistry, IntegrationRegistry};
pub use schema::{ObjectSchema, SchemaError, SchemaNode};
pub use types::{
    ActionQuery, EndpointDescriptor, EndpointDocument, ExecutionResult, IdentifiedEndpoints,
    Integration, StageLatency,
};

/// Errors raised by the resolution pipeline
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Retrieval plus filtering left no usable endpoint
    #[error("No matching endpoint in integration '{integration_id}' for query '{query}'")]
    NoMatchingEndpoint { integration_id: String, query: String },

    /// Generated parameters or body did not fit the declared schema
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// The outbound call failed
    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Language model call failed
    #[error("LLM error: {0}")]
    Llm(#[from] llm::LlmError),

    /// Parameter or body specification could not be normalized
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// No candidate integration fits a step
    #[error("Integration selection failed: {0}")]
    Selection(String),

    /// The query could not be split into steps
    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    /// A step resolved to an integration the request did not configure
    #[error("Unknown integration: {0}")]
    UnknownIntegration(String),
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

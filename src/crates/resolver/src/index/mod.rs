//! Semantic index over endpoint documents
//!
//! One collection per integration, named by the integration id.

mod memory;
mod qdrant;

pub use memory::InMemoryIndex;
pub use qdrant::{QdrantConfig, QdrantIndex};

use crate::types::EndpointDocument;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Collection not found: {0}")]
    MissingCollection(String),

    #[error("Invalid collection name '{0}'")]
    InvalidCollection(String),

    #[error("Index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid index response: {0}")]
    InvalidResponse(String),
}

/// Nearest-neighbour lookup plus a full listing.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Up to `limit` documents ranked by relevance to `text`.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<EndpointDocument>, IndexError>;

    /// Every document in the collection.
    async fn list(&self, collection: &str) -> Result<Vec<EndpointDocument>, IndexError>;
}

//! Candidate endpoint lookup
//!
//! Retrieval never fails: a missing collection or a broken index degrades to
//! an empty candidate list, which later surfaces as "no matching endpoint".

use crate::index::SemanticIndex;
use crate::types::EndpointDocument;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of candidates fetched per query.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

#[derive(Clone)]
pub struct EndpointRetriever {
    index: Arc<dyn SemanticIndex>,
    limit: usize,
}

impl EndpointRetriever {
    pub fn new(index: Arc<dyn SemanticIndex>, limit: usize) -> Self {
        Self {
            index,
            limit: limit.max(1),
        }
    }

    pub async fn retrieve(&self, integration_id: &str, text: &str) -> Vec<EndpointDocument> {
        match self.index.query(integration_id, text, self.limit).await {
            Ok(documents) => {
                debug!(integration_id, candidates = documents.len(), "Retrieved candidates");
                documents
            }
            Err(e) => {
                warn!(integration_id, error = %e, "Retrieval failed, continuing without candidates");
                Vec::new()
            }
        }
    }

    /// Full unranked listing, used to build lookup tools.
    pub async fn list_all(&self, integration_id: &str) -> Vec<EndpointDocument> {
        match self.index.list(integration_id).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(integration_id, error = %e, "Listing failed, continuing without documents");
                Vec::new()
            }
        }
    }
}

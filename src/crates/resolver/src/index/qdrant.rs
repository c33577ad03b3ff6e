//! Qdrant REST client
//!
//! Queries use server-side inference: the query text is sent as a document
//! together with the embedding model name, so no local embedding is needed.

use super::{IndexError, SemanticIndex};
use crate::types::EndpointDocument;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const SCROLL_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
    /// Named vector to search; `None` for the default vector
    pub vector_name: Option<String>,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: None,
            embedding_model: embedding_model.into(),
            vector_name: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_vector_name(mut self, vector_name: Option<String>) -> Self {
        self.vector_name = vector_name.filter(|v| !v.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("embedding_model", &self.embedding_model)
            .field("vector_name", &self.vector_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct QdrantIndex {
    config: QdrantConfig,
    client: Client,
}

impl QdrantIndex {
    pub fn new(config: QdrantConfig) -> Result<Self, IndexError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn post(&self, collection: &str, operation: &str) -> RequestBuilder {
        let url = format!(
            "{}/collections/{}/points/{}",
            self.config.url, collection, operation
        );
        let request = self.client.post(url);
        match &self.config.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send<B: Serialize>(
        &self,
        collection: &str,
        operation: &str,
        body: &B,
    ) -> Result<PointsEnvelope, IndexError> {
        if !is_collection_name(collection) {
            return Err(IndexError::InvalidCollection(collection.to_string()));
        }
        let response = self.post(collection, operation).json(body).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(IndexError::MissingCollection(collection.to_string())),
            status if !status.is_success() => Err(IndexError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
            _ => response
                .json::<PointsEnvelope>()
                .await
                .map_err(|e| IndexError::InvalidResponse(e.to_string())),
        }
    }
}

/// Collection names are integration ids: `[A-Za-z0-9_-]+`.
fn is_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn documents(points: Vec<Point>) -> Vec<EndpointDocument> {
    points
        .into_iter()
        .filter_map(|point| point.payload.as_ref().and_then(EndpointDocument::from_payload))
        .collect()
}

#[async_trait]
impl SemanticIndex for QdrantIndex {
    async fn query(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<EndpointDocument>, IndexError> {
        let body = QueryRequest {
            query: InferenceDocument {
                text,
                model: &self.config.embedding_model,
            },
            using: self.config.vector_name.as_deref(),
            limit,
            with_payload: true,
        };

        let envelope = self.send(collection, "query", &body).await?;
        let points = envelope.result.points;
        debug!(collection, hits = points.len(), "Qdrant query returned");
        Ok(documents(points))
    }

    async fn list(&self, collection: &str) -> Result<Vec<EndpointDocument>, IndexError> {
        let mut offset: Option<Value> = None;
        let mut all = Vec::new();

        loop {
            let body = ScrollRequest {
                limit: SCROLL_PAGE_SIZE,
                with_payload: true,
                offset: offset.take(),
            };
            let envelope = self.send(collection, "scroll", &body).await?;
            all.extend(documents(envelope.result.points));

            match envelope.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        debug!(collection, documents = all.len(), "Qdrant scroll complete");
        Ok(all)
    }
}

// Qdrant API types
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: InferenceDocument<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    using: Option<&'a str>,
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Serialize)]
struct InferenceDocument<'a> {
    text: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct ScrollRequest {
    limit: usize,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PointsEnvelope {
    result: PointsResult,
}

#[derive(Debug, Deserialize)]
struct PointsResult {
    #[serde(default)]
    points: Vec<Point>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Point {
    #[serde(default)]
    payload: Option<Value>,
}

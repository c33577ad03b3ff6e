use super::{IndexError, SemanticIndex};
use crate::types::EndpointDocument;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Fixed in-memory index ranking by keyword overlap.
///
/// Built up front and never mutated, so it can be shared freely. Every
/// document is a candidate; ties keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    collections: HashMap<String, Vec<EndpointDocument>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(
        mut self,
        collection: impl Into<String>,
        documents: Vec<EndpointDocument>,
    ) -> Self {
        self.collections.insert(collection.into(), documents);
        self
    }

    fn documents(&self, collection: &str) -> Result<&[EndpointDocument], IndexError> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| IndexError::MissingCollection(collection.to_string()))
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn score(query: &HashSet<String>, document: &EndpointDocument) -> usize {
    let haystack = tokens(&format!(
        "{} {} {}",
        document.method, document.url, document.description
    ));
    query.intersection(&haystack).count()
}

#[async_trait]
impl SemanticIndex for InMemoryIndex {
    async fn query(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<EndpointDocument>, IndexError> {
        let query = tokens(text);
        let mut ranked: Vec<(usize, &EndpointDocument)> = self
            .documents(collection)?
            .iter()
            .map(|doc| (score(&query, doc), doc))
            .collect();

        // stable: equal scores keep insertion order
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<EndpointDocument>, IndexError> {
        Ok(self.documents(collection)?.to_vec())
    }
}

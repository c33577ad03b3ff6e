use super::AgentSettings;
use crate::types::{trim_api_base, EndpointDescriptor, EndpointDocument};
use llm::{ChatModel, StructuredAgent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

const INSTRUCTIONS: &str = "You are given a user query and a list of candidate API endpoints. \
Select the endpoints that directly serve the query. Copy the method and url of each selected \
endpoint exactly as given. Return an empty list when none fits.";

#[derive(Serialize)]
struct FilterInput<'a> {
    query: &'a str,
    endpoints: Vec<EndpointDescriptor>,
}

#[derive(Deserialize)]
struct FilterOutput {
    #[serde(default)]
    filtered_endpoints: Vec<EndpointDescriptor>,
}

/// Narrows retrieved candidates to those that answer the query.
#[derive(Debug, Clone)]
pub struct EndpointFilterer {
    agent: StructuredAgent,
}

impl EndpointFilterer {
    pub fn new(settings: &AgentSettings) -> Self {
        let agent = StructuredAgent::new("endpoint_filterer", INSTRUCTIONS)
            .input(
                "query",
                "The information or action the user is after, such as 'show cart details'",
            )
            .input("endpoints", "Candidate endpoints with method, full url and description")
            .output(
                "filtered_endpoints",
                "List of the selected endpoints, each an object with method, url and description",
            );
        Self {
            agent: settings.configure(agent),
        }
    }

    /// Subset of `candidates` selected by the model.
    pub async fn filter(
        &self,
        model: &dyn ChatModel,
        query: &str,
        candidates: &[EndpointDocument],
        api_base: &str,
    ) -> crate::Result<Vec<EndpointDocument>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let endpoints = candidates
            .iter()
            .map(|doc| EndpointDescriptor {
                method: doc.method.clone(),
                url: doc.full_url(api_base),
                description: doc.description.clone(),
            })
            .collect();

        let output: FilterOutput = self
            .agent
            .invoke(model, &FilterInput { query, endpoints })
            .await?;

        let kept = retain_selected(candidates, &output.filtered_endpoints, api_base);
        debug!(
            candidates = candidates.len(),
            selected = output.filtered_endpoints.len(),
            kept = kept.len(),
            "Filtered endpoints"
        );
        Ok(kept)
    }
}

/// Map model selections back onto candidates by method and url.
///
/// Selections absent from `candidates` are dropped, as are repeats. A url
/// carrying the API base prefix is matched without it.
pub fn retain_selected(
    candidates: &[EndpointDocument],
    selections: &[EndpointDescriptor],
    api_base: &str,
) -> Vec<EndpointDocument> {
    let base = trim_api_base(api_base);
    let mut seen = HashSet::new();

    selections
        .iter()
        .filter_map(|selection| {
            let method = selection.method.trim().to_ascii_uppercase();
            let url = selection.url.trim();
            let path = match url.strip_prefix(base) {
                Some(rest) if !base.is_empty() => rest,
                _ => url,
            };

            candidates
                .iter()
                .position(|doc| doc.method == method && doc.url == path)
                .filter(|index| seen.insert(*index))
                .map(|index| candidates[index].clone())
        })
        .collect()
}

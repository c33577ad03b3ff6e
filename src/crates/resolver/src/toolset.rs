//! Lookup tools offered to the synthesizers
//!
//! Every `GET` endpoint of an integration becomes a read-only tool, so the
//! model can fetch ids or other values it needs before filling a request.

use crate::executor::{expand_path, ActionExecutor, ActionRequest, HttpMethod};
use crate::schema::{normalize, to_json_schema};
use crate::types::EndpointDocument;
use async_trait::async_trait;
use llm::{Tool, ToolDefinition, ToolSet};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

const MAX_TOOL_NAME_LEN: usize = 64;

/// Calls one `GET` endpoint with model-supplied parameters.
pub struct EndpointLookupTool {
    definition: ToolDefinition,
    url: String,
    headers: BTreeMap<String, String>,
    executor: Arc<ActionExecutor>,
}

impl EndpointLookupTool {
    pub fn new(
        name: String,
        document: &EndpointDocument,
        api_base: &str,
        headers: BTreeMap<String, String>,
        executor: Arc<ActionExecutor>,
    ) -> crate::Result<Self> {
        let schema = normalize(&document.parameters, &format!("{}Parameters", name))?;
        let description = if document.description.trim().is_empty() {
            format!("GET {}", document.url)
        } else {
            format!("GET {}: {}", document.url, document.description.trim())
        };

        Ok(Self {
            definition: ToolDefinition::new(name, description).with_parameters(to_json_schema(&schema)),
            url: document.full_url(api_base),
            headers,
            executor,
        })
    }
}

#[async_trait]
impl Tool for EndpointLookupTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn call(&self, arguments: Value) -> Result<Value, String> {
        let (url, params) = expand_path(&self.url, &arguments).map_err(|e| e.to_string())?;
        let request = ActionRequest::new(HttpMethod::Get, url)
            .with_params(params)
            .with_headers(self.headers.clone());

        self.executor
            .execute(&request)
            .await
            .map(|response| response.payload)
            .map_err(|e| e.to_string())
    }
}

/// Tool name derived from method and path, limited to `[a-zA-Z0-9_]`.
pub fn tool_name(document: &EndpointDocument) -> String {
    let raw = format!("{}_{}", document.method.to_ascii_lowercase(), document.url);
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && name.ends_with('_') {
            continue;
        }
        name.push(c);
    }
    let mut name = name.trim_end_matches('_').to_string();
    name.truncate(MAX_TOOL_NAME_LEN);
    name
}

/// Build the lookup toolset for an integration.
///
/// Documents whose parameter specification cannot be normalized are skipped.
pub fn build_toolset(
    documents: &[EndpointDocument],
    api_base: &str,
    headers: &BTreeMap<String, String>,
    executor: Arc<ActionExecutor>,
) -> ToolSet {
    let mut toolset = ToolSet::new();
    let mut taken = HashSet::new();

    for document in documents.iter().filter(|d| d.method == "GET") {
        let name = unique_name(tool_name(document), &mut taken);
        match EndpointLookupTool::new(name, document, api_base, headers.clone(), executor.clone()) {
            Ok(tool) => toolset.insert(Arc::new(tool)),
            Err(e) => debug!(url = %document.url, error = %e, "Skipping lookup tool"),
        }
    }

    debug!(tools = toolset.len(), "Built lookup toolset");
    toolset
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        let suffix = format!("_{}", n);
        let mut stem = base.clone();
        stem.truncate(MAX_TOOL_NAME_LEN - suffix.len());
        candidate = format!("{}{}", stem, suffix);
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

//! Shared data model: integrations, endpoint documents, queries and results

use crate::executor::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// A registered target API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Integration {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Indexed description of one (method, url) pair of a target API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDocument {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub response: Value,
}

impl EndpointDocument {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            description: description.into(),
            parameters: Value::Null,
            body: Value::Null,
            response: Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = response;
        self
    }

    /// Build a document from an index payload.
    ///
    /// `parameters`, `body` and `response` may be stored as JSON-encoded
    /// strings or inline. Payloads without method or url are skipped.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let method = payload.get("method").and_then(Value::as_str);
        let url = payload.get("url").and_then(Value::as_str);

        let (method, url) = match (method, url) {
            (Some(m), Some(u)) if !m.trim().is_empty() && !u.trim().is_empty() => (m, u),
            _ => {
                debug!("Skipping index payload without method or url");
                return None;
            }
        };

        Some(Self {
            method: method.trim().to_ascii_uppercase(),
            url: url.trim().to_string(),
            description: payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            parameters: decode_embedded(payload.get("parameters")),
            body: decode_embedded(payload.get("body")),
            response: decode_embedded(payload.get("response")),
        })
    }

    /// Key unique within an integration.
    pub fn key(&self) -> String {
        format!("{}_{}", self.method, self.url)
    }

    /// External identifier, `{METHOD}_{api_base}{url}`.
    pub fn id(&self, api_base: &str) -> String {
        format!("{}_{}", self.method, self.full_url(api_base))
    }

    pub fn full_url(&self, api_base: &str) -> String {
        format!("{}{}", trim_api_base(api_base), self.url)
    }

    pub fn http_method(&self) -> Result<HttpMethod, crate::ExecutionError> {
        self.method.parse()
    }

    pub fn descriptor(&self) -> EndpointDescriptor {
        EndpointDescriptor {
            method: self.method.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
        }
    }
}

/// Reduced view of an endpoint shown to the filterer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

fn decode_embedded(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(raw)) if raw.trim().is_empty() => Value::Null,
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Strip trailing slashes from an API base URL.
pub fn trim_api_base(api_base: &str) -> &str {
    api_base.trim_end_matches('/')
}

/// A single-step request against one integration.
#[derive(Debug, Clone, Default)]
pub struct ActionQuery {
    pub integration_id: String,
    pub api_base: String,
    pub query: String,
    pub rephrase: bool,
    pub rephrasal_instructions: Option<String>,
    /// Forwarded to the target API unmodified
    pub headers: BTreeMap<String, String>,
    /// Answers of earlier steps; seen by synthesis, not by retrieval
    pub context: Option<String>,
}

impl ActionQuery {
    pub fn new(
        integration_id: impl Into<String>,
        api_base: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            integration_id: integration_id.into(),
            api_base: api_base.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_rephraser(mut self, instructions: Option<String>) -> Self {
        self.rephrase = true;
        self.rephrasal_instructions = instructions;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Query text for parameter, body and answer synthesis.
    pub fn contextualized(&self) -> Cow<'_, str> {
        match &self.context {
            Some(context) => Cow::Owned(format!(
                "{}\n\nContext from previous steps:\n{}",
                self.query, context
            )),
            None => Cow::Borrowed(&self.query),
        }
    }

    pub fn api_base(&self) -> &str {
        trim_api_base(&self.api_base)
    }
}

/// Endpoints that survived retrieval and filtering.
#[derive(Debug, Clone)]
pub struct IdentifiedEndpoints {
    pub endpoints: Vec<EndpointDocument>,
    pub rephrased_query: String,
}

/// Time spent in the target call and in the whole pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageLatency {
    pub api: Duration,
    pub total: Duration,
}

impl StageLatency {
    /// Pipeline time excluding the target call.
    pub fn kramen(&self) -> Duration {
        self.total.saturating_sub(self.api)
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub endpoint: EndpointDocument,
    pub method: HttpMethod,
    pub url: String,
    pub parameters: Value,
    pub body: Value,
    pub response: Value,
    pub answer: String,
    pub latency: StageLatency,
}

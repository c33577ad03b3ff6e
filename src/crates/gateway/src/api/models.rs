//! Request and response bodies of the HTTP surface

use resolver::{
    ActionQuery, DeepOutcome, DeepQuery, EndpointDocument, ExecutionResult, IdentifiedEndpoints,
    StepFailure, StepRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::api::error::{ApiError, ApiResult};

/// Model choice and the caller's own provider credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm: String,
    pub llm_api_key: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("llm", &self.llm)
            .field("llm_api_key", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyEndpointsRequest {
    pub api_base: String,
    pub integration_id: String,
    pub query: String,
    #[serde(default)]
    pub rephrasal_instructions: Option<String>,
    #[serde(default)]
    pub rephraser: bool,
    pub llm_config: LlmConfig,
}

impl IdentifyEndpointsRequest {
    pub fn validate(&self) -> ApiResult<()> {
        require("integration_id", &self.integration_id)?;
        require("api_base", &self.api_base)?;
        require("query", &self.query)
    }

    pub fn to_query(&self) -> ActionQuery {
        let query = ActionQuery::new(&self.integration_id, &self.api_base, &self.query);
        if self.rephraser {
            query.with_rephraser(self.rephrasal_instructions.clone())
        } else {
            query
        }
    }
}

/// One surviving endpoint, with its `{METHOD}_{api_base}{url}` id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointView {
    pub id: String,
    pub method: String,
    pub url: String,
    pub description: String,
    pub parameters: Value,
    pub body: Value,
    pub response: Value,
}

impl EndpointView {
    pub fn from_document(doc: EndpointDocument, api_base: &str) -> Self {
        Self {
            id: doc.id(api_base),
            method: doc.method,
            url: doc.url,
            description: doc.description,
            parameters: doc.parameters,
            body: doc.body,
            response: doc.response,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyEndpointsResponse {
    pub endpoints: Vec<EndpointView>,
    pub rephrased_query: String,
}

impl IdentifyEndpointsResponse {
    pub fn new(identified: IdentifiedEndpoints, api_base: &str) -> Self {
        Self {
            endpoints: identified
                .endpoints
                .into_iter()
                .map(|doc| EndpointView::from_document(doc, api_base))
                .collect(),
            rephrased_query: identified.rephrased_query,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunActionRequest {
    pub integration_id: String,
    pub api_base: String,
    pub query: String,
    #[serde(default)]
    pub rephraser: bool,
    #[serde(default)]
    pub rephrasal_instructions: Option<String>,
    /// Forwarded unmodified to the target API
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,
    pub llm_config: LlmConfig,
}

impl RunActionRequest {
    pub fn validate(&self) -> ApiResult<()> {
        require("integration_id", &self.integration_id)?;
        require("api_base", &self.api_base)?;
        require("query", &self.query)
    }

    pub fn to_query(&self) -> ActionQuery {
        let query = ActionQuery::new(&self.integration_id, &self.api_base, &self.query)
            .with_headers(self.request_headers.clone());
        if self.rephraser {
            query.with_rephraser(self.rephrasal_instructions.clone())
        } else {
            query
        }
    }
}

/// The call that was made and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedRequest {
    /// Full URL, path placeholders filled in
    pub endpoint: String,
    pub method: String,
    pub parameters: Value,
    pub body: Value,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunActionResponse {
    pub natural_language_response: String,
    pub request: ExecutedRequest,
    /// Seconds spent in the target call
    pub api_latency: f64,
    /// Seconds spent everywhere else
    pub kramen_latency: f64,
}

impl From<ExecutionResult> for RunActionResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            natural_language_response: result.answer,
            api_latency: result.latency.api.as_secs_f64(),
            kramen_latency: result.latency.kramen().as_secs_f64(),
            request: ExecutedRequest {
                endpoint: result.url,
                method: result.method.to_string(),
                parameters: result.parameters,
                body: result.body,
                response: result.response,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepRequest {
    pub integrations: Vec<String>,
    /// Base URL per integration id
    pub api_base: HashMap<String, String>,
    #[serde(default)]
    pub request_headers: HashMap<String, BTreeMap<String, String>>,
    pub query: String,
    pub llm_config: LlmConfig,
}

impl DeepRequest {
    pub fn validate(&self) -> ApiResult<()> {
        require("query", &self.query)?;
        if self.integrations.is_empty() {
            return Err(ApiError::BadRequest("integrations must not be empty".into()));
        }
        if let Some(missing) = self
            .integrations
            .iter()
            .find(|id| !self.api_base.contains_key(id.as_str()))
        {
            return Err(ApiError::BadRequest(format!(
                "api_base has no entry for integration '{}'",
                missing
            )));
        }
        Ok(())
    }

    pub fn to_query(&self) -> DeepQuery {
        let mut seen = Vec::with_capacity(self.integrations.len());
        self.integrations
            .iter()
            .filter(|id| {
                let fresh = !seen.contains(id);
                seen.push(*id);
                fresh
            })
            .fold(DeepQuery::new(&self.query), |deep, id| {
                let api_base = self.api_base.get(id).cloned().unwrap_or_default();
                let headers = self.request_headers.get(id).cloned().unwrap_or_default();
                deep.with_integration(id.as_str(), api_base, headers)
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepResponse {
    pub natural_language_response: String,
    /// Rendered transcript of the completed steps
    pub context: String,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DeepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepFailure {
    pub step_index: usize,
    pub stage: String,
    pub reason: String,
}

impl From<StepFailure> for DeepFailure {
    fn from(failure: StepFailure) -> Self {
        Self {
            step_index: failure.step_index,
            stage: failure.stage,
            reason: failure.reason,
        }
    }
}

impl From<DeepOutcome> for DeepResponse {
    fn from(outcome: DeepOutcome) -> Self {
        Self {
            natural_language_response: outcome.natural_language_response(),
            context: outcome.transcript.render(),
            failure: outcome.failure.map(DeepFailure::from),
            steps: outcome.transcript.into_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn new(status: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            version: version.into(),
        }
    }
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::BadRequest(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

//! Single-step pipeline
//!
//! Rephrase (optional), retrieve, filter, synthesize, execute, answer. The
//! stages are also exposed one by one so the step orchestrator can track
//! where a step is.

use crate::agents::{
    AgentSettings, EndpointFilterer, QueryRephraser, ResponseSynthesizer, SynthesisKind,
    Synthesizer, DEFAULT_MAX_STEPS,
};
use crate::executor::{expand_path, ActionExecutor, ActionRequest, ActionResponse, HttpMethod};
use crate::index::SemanticIndex;
use crate::retriever::{EndpointRetriever, DEFAULT_RETRIEVAL_LIMIT};
use crate::schema::{normalize, ObjectSchema};
use crate::toolset::build_toolset;
use crate::types::{ActionQuery, EndpointDocument, ExecutionResult, IdentifiedEndpoints, StageLatency};
use crate::{ResolverError, Result};
use llm::{ChatModel, ToolSet, DEFAULT_MAX_TOOL_ROUNDS};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tooling::async_utils::RetryPolicy;
use tooling::logging::timed;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retrieval_limit: usize,
    pub max_tool_rounds: usize,
    pub max_steps: usize,
    /// Applies to model calls only; target API calls are never retried
    pub retry: RetryPolicy,
    pub llm_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_steps: DEFAULT_MAX_STEPS,
            retry: RetryPolicy::none(),
            llm_timeout: None,
        }
    }
}

impl PipelineSettings {
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            retry: self.retry.clone(),
            timeout: self.llm_timeout,
            max_tool_rounds: self.max_tool_rounds,
        }
    }
}

/// A fully specified call, ready to execute.
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub endpoint: EndpointDocument,
    pub method: HttpMethod,
    /// Absolute url with path placeholders filled in
    pub url: String,
    /// Everything the synthesizer produced for the parameter schema
    pub parameters: Value,
    /// Parameters left for the query string after path expansion
    pub query_params: Value,
    pub body: Value,
    pub rephrased_query: String,
}

impl ResolvedAction {
    pub fn request(&self, headers: &BTreeMap<String, String>) -> ActionRequest {
        let request = ActionRequest::new(self.method, self.url.clone())
            .with_params(self.query_params.clone())
            .with_headers(headers.clone());
        if self.method.sends_body() {
            request.with_body(self.body.clone())
        } else {
            request
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    retriever: EndpointRetriever,
    executor: Arc<ActionExecutor>,
    rephraser: QueryRephraser,
    filterer: EndpointFilterer,
    parameters: Synthesizer,
    body: Synthesizer,
    responder: ResponseSynthesizer,
}

impl Pipeline {
    pub fn new(
        index: Arc<dyn SemanticIndex>,
        executor: Arc<ActionExecutor>,
        settings: &PipelineSettings,
    ) -> Self {
        let agents = settings.agent_settings();
        Self {
            retriever: EndpointRetriever::new(index, settings.retrieval_limit),
            executor,
            rephraser: QueryRephraser::new(&agents),
            filterer: EndpointFilterer::new(&agents),
            parameters: Synthesizer::new(SynthesisKind::Parameters, &agents),
            body: Synthesizer::new(SynthesisKind::Body, &agents),
            responder: ResponseSynthesizer::new(&agents),
        }
    }

    pub fn retriever(&self) -> &EndpointRetriever {
        &self.retriever
    }

    pub fn responder(&self) -> &ResponseSynthesizer {
        &self.responder
    }

    /// Rephrase when asked, retrieve candidates, keep the relevant ones.
    pub async fn identify_endpoints(
        &self,
        model: &dyn ChatModel,
        query: &ActionQuery,
    ) -> Result<IdentifiedEndpoints> {
        let rephrased_query = if query.rephrase {
            timed(
                "rephrase",
                self.rephraser
                    .rephrase(model, &query.query, query.rephrasal_instructions.as_deref()),
            )
            .await?
        } else {
            query.query.clone()
        };

        let candidates = timed(
            "retrieve",
            self.retriever.retrieve(&query.integration_id, &rephrased_query),
        )
        .await;

        let endpoints = timed(
            "filter",
            self.filterer
                .filter(model, &rephrased_query, &candidates, query.api_base()),
        )
        .await?;

        Ok(IdentifiedEndpoints {
            endpoints,
            rephrased_query,
        })
    }

    /// Pick the endpoint and synthesize its parameters and body.
    pub async fn resolve(&self, model: &dyn ChatModel, query: &ActionQuery) -> Result<ResolvedAction> {
        let identified = self.identify_endpoints(model, query).await?;

        let endpoint = identified.endpoints.into_iter().next().ok_or_else(|| {
            ResolverError::NoMatchingEndpoint {
                integration_id: query.integration_id.clone(),
                query: query.query.clone(),
            }
        })?;
        let method = endpoint.http_method()?;
        debug!(endpoint = %endpoint.key(), "Resolved endpoint");

        let parameter_schema = normalize(&endpoint.parameters, SynthesisKind::Parameters.model_name())?;
        let body_schema = if method.sends_body() {
            normalize(&endpoint.body, SynthesisKind::Body.model_name())?
        } else {
            ObjectSchema::new(SynthesisKind::Body.model_name())
        };

        let synthesis_query = query.contextualized();
        let tools = if parameter_schema.is_empty() && body_schema.is_empty() {
            ToolSet::new()
        } else {
            self.lookup_tools(query).await
        };

        let parameters = if parameter_schema.is_empty() {
            empty_object()
        } else {
            timed(
                "synthesize_parameters",
                self.parameters
                    .synthesize_schema(model, &synthesis_query, &parameter_schema, &tools),
            )
            .await?
        };

        let body = if body_schema.is_empty() {
            empty_object()
        } else {
            timed(
                "synthesize_body",
                self.body.synthesize_schema(model, &synthesis_query, &body_schema, &tools),
            )
            .await?
        };

        let (url, query_params) = expand_path(&endpoint.full_url(query.api_base()), &parameters)?;

        Ok(ResolvedAction {
            endpoint,
            method,
            url,
            parameters,
            query_params,
            body,
            rephrased_query: identified.rephrased_query,
        })
    }

    async fn lookup_tools(&self, query: &ActionQuery) -> ToolSet {
        let documents = self.retriever.list_all(&query.integration_id).await;
        build_toolset(&documents, query.api_base(), &query.headers, self.executor.clone())
    }

    pub async fn execute(
        &self,
        action: &ResolvedAction,
        headers: &BTreeMap<String, String>,
    ) -> Result<ActionResponse> {
        let response = self.executor.execute(&action.request(headers)).await?;
        Ok(response)
    }

    /// Natural-language answer grounded in the call's response.
    pub async fn answer(
        &self,
        model: &dyn ChatModel,
        query: &str,
        action: &ResolvedAction,
        response: &Value,
    ) -> Result<String> {
        timed(
            "answer",
            self.responder
                .answer(model, query, &action.endpoint.response, response),
        )
        .await
    }

    /// Run every stage for one query.
    pub async fn run_action(&self, model: &dyn ChatModel, query: &ActionQuery) -> Result<ExecutionResult> {
        let started = Instant::now();

        let action = self.resolve(model, query).await?;
        let response = self.execute(&action, &query.headers).await?;
        let answer = self
            .answer(model, &query.contextualized(), &action, &response.payload)
            .await?;

        let latency = StageLatency {
            api: response.latency,
            total: started.elapsed(),
        };
        info!(
            integration_id = %query.integration_id,
            endpoint = %action.endpoint.key(),
            status = response.status,
            api_ms = latency.api.as_millis() as u64,
            kramen_ms = latency.kramen().as_millis() as u64,
            "Action completed"
        );

        Ok(ExecutionResult {
            endpoint: action.endpoint,
            method: action.method,
            url: action.url,
            parameters: action.parameters,
            body: action.body,
            response: response.payload,
            answer,
            latency,
        })
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

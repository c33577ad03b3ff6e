//! Multi-step runs
//!
//! A deep query is decomposed into steps that run strictly in order through
//! the single-step pipeline. The run is a fold over the steps threading a
//! [`Transcript`]; the first failure halts it and the completed prefix is
//! returned with the failure.

mod state;
mod transcript;

pub use state::StepState;
pub use transcript::{StepRecord, Transcript};

use crate::agents::{IntegrationProfile, IntegrationSelector, TaskDecomposer};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::registry::IntegrationRegistry;
use crate::types::ActionQuery;
use crate::{ResolverError, Result};
use futures::stream::{self, TryStreamExt};
use llm::ChatModel;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A request spanning several integrations.
#[derive(Debug, Clone, Default)]
pub struct DeepQuery {
    pub query: String,
    pub integrations: Vec<String>,
    pub api_bases: HashMap<String, String>,
    pub headers: HashMap<String, BTreeMap<String, String>>,
}

impl DeepQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_integration(
        mut self,
        id: impl Into<String>,
        api_base: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        let id = id.into();
        self.api_bases.insert(id.clone(), api_base.into());
        self.headers.insert(id.clone(), headers);
        self.integrations.push(id);
        self
    }
}

/// Why and where a run halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step_index: usize,
    /// State the step was in when it failed
    pub stage: String,
    pub reason: String,
}

impl StepFailure {
    fn at(state: &StepState, reason: impl Into<String>) -> Self {
        Self {
            step_index: state.index(),
            stage: state.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeepOutcome {
    /// The decomposed plan
    pub steps: Vec<String>,
    /// Completed steps only
    pub transcript: Transcript,
    /// Consolidated answer; `None` when a step failed
    pub answer: Option<String>,
    pub failure: Option<StepFailure>,
}

impl DeepOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// The answer, or a description of the failure.
    pub fn natural_language_response(&self) -> String {
        match (&self.answer, &self.failure) {
            (_, Some(failure)) => format!("Step {} failed: {}", failure.step_index + 1, failure.reason),
            (Some(answer), None) => answer.clone(),
            (None, None) => String::new(),
        }
    }
}

struct Halted {
    transcript: Transcript,
    failure: StepFailure,
}

#[derive(Clone)]
pub struct StepOrchestrator {
    pipeline: Pipeline,
    decomposer: TaskDecomposer,
    selector: IntegrationSelector,
    registry: Arc<dyn IntegrationRegistry>,
}

impl StepOrchestrator {
    pub fn new(
        pipeline: Pipeline,
        registry: Arc<dyn IntegrationRegistry>,
        settings: &PipelineSettings,
    ) -> Self {
        let agents = settings.agent_settings();
        Self {
            pipeline,
            decomposer: TaskDecomposer::new(&agents, settings.max_steps),
            selector: IntegrationSelector::new(&agents),
            registry,
        }
    }

    /// Decompose the query and run its steps in order.
    ///
    /// Only decomposition failures are returned as `Err`; a failing step
    /// ends the run with a [`StepFailure`] in the outcome.
    pub async fn run(
        &self,
        model: &dyn ChatModel,
        deep: &DeepQuery,
        cancel: &CancellationToken,
    ) -> Result<DeepOutcome> {
        if deep.integrations.is_empty() {
            return Err(ResolverError::Selection("no integrations given".to_string()));
        }

        let steps = self.decomposer.decompose(model, &deep.query).await?;
        info!(steps = steps.len(), integrations = deep.integrations.len(), "Starting deep run");

        let profiles = self.profiles(&deep.integrations).await;
        let profiles = profiles.as_slice();

        let folded = stream::iter(steps.iter().enumerate().map(Ok::<_, Halted>))
            .try_fold(Transcript::new(), |transcript, (index, step)| async move {
                match self
                    .run_step(model, deep, profiles, cancel, index, step, &transcript)
                    .await
                {
                    Ok(answer) => Ok(transcript.with_entry(step.as_str(), answer)),
                    Err(failure) => Err(Halted {
                        transcript,
                        failure,
                    }),
                }
            })
            .await;

        match folded {
            Ok(transcript) => {
                let answer = self.consolidate(model, &deep.query, &transcript).await;
                Ok(DeepOutcome {
                    steps,
                    transcript,
                    answer: Some(answer),
                    failure: None,
                })
            }
            Err(Halted {
                transcript,
                failure,
            }) => Ok(DeepOutcome {
                steps,
                transcript,
                answer: None,
                failure: Some(failure),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        model: &dyn ChatModel,
        deep: &DeepQuery,
        profiles: &[IntegrationProfile],
        cancel: &CancellationToken,
        index: usize,
        step: &str,
        transcript: &Transcript,
    ) -> std::result::Result<String, StepFailure> {
        let mut state = StepState::Pending(index);
        debug!(%state, "Step transition");
        if cancel.is_cancelled() {
            return Err(halt(&state, "cancelled"));
        }

        state = transition(StepState::Resolving(index));
        let integration_id = self
            .selector
            .select(model, step, profiles)
            .await
            .map_err(|e| halt(&state, e.to_string()))?;
        let api_base = deep
            .api_bases
            .get(&integration_id)
            .ok_or_else(|| halt(&state, ResolverError::UnknownIntegration(integration_id.clone()).to_string()))?;
        let headers = deep.headers.get(&integration_id).cloned().unwrap_or_default();

        let query = ActionQuery::new(&integration_id, api_base, step)
            .with_headers(headers)
            .with_context(transcript.context());
        let action = self
            .pipeline
            .resolve(model, &query)
            .await
            .map_err(|e| halt(&state, e.to_string()))?;

        state = transition(StepState::Executing(index));
        let response = self
            .pipeline
            .execute(&action, &query.headers)
            .await
            .map_err(|e| halt(&state, e.to_string()))?;

        state = transition(StepState::Synthesizing(index));
        let answer = self
            .pipeline
            .answer(model, &query.contextualized(), &action, &response.payload)
            .await
            .map_err(|e| halt(&state, e.to_string()))?;

        transition(StepState::Completed(index));
        Ok(answer)
    }

    async fn profiles(&self, integrations: &[String]) -> Vec<IntegrationProfile> {
        if let [only] = integrations {
            return vec![IntegrationProfile::new(only.as_str())];
        }

        futures::future::join_all(integrations.iter().map(|id| self.profile(id))).await
    }

    async fn profile(&self, id: &str) -> IntegrationProfile {
        let documents = self.pipeline.retriever().list_all(id).await;
        let capabilities = documents.iter().map(|doc| {
            if doc.description.trim().is_empty() {
                format!("{} {}", doc.method, doc.url)
            } else {
                doc.description.trim().to_string()
            }
        });

        IntegrationProfile::new(id)
            .with_name(self.registry.get(id).map(|integration| integration.name))
            .with_capabilities(capabilities)
    }

    async fn consolidate(&self, model: &dyn ChatModel, query: &str, transcript: &Transcript) -> String {
        match self
            .pipeline
            .responder()
            .answer_from_context(model, query, &transcript.render())
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Consolidated answer failed, using last step's answer");
                transcript.last_response().unwrap_or_default().to_string()
            }
        }
    }
}

fn transition(state: StepState) -> StepState {
    debug!(%state, "Step transition");
    state
}

fn halt(state: &StepState, reason: impl Into<String>) -> StepFailure {
    let failure = StepFailure::at(state, reason);
    warn!(state = %state.fail(failure.reason.as_str()), stage = %failure.stage, "Step failed");
    failure
}

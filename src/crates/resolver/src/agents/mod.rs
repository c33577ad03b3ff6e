//! Structured-completion stages
//!
//! Each stage owns a [`StructuredAgent`] with its own instructions and field
//! contract. Stages hold no credentials; the model is passed per call.

mod decomposer;
mod filterer;
mod rephraser;
mod responder;
mod selector;
mod synthesizer;

pub use decomposer::{TaskDecomposer, DEFAULT_MAX_STEPS};
pub use filterer::{retain_selected, EndpointFilterer};
pub use rephraser::QueryRephraser;
pub use responder::ResponseSynthesizer;
pub use selector::{IntegrationProfile, IntegrationSelector, MAX_PROFILE_CAPABILITIES};
pub use synthesizer::{SynthesisKind, Synthesizer};

use llm::{StructuredAgent, DEFAULT_MAX_TOOL_ROUNDS};
use std::time::Duration;
use tooling::async_utils::RetryPolicy;

/// Shared call settings applied to every stage.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    pub max_tool_rounds: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::none(),
            timeout: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl AgentSettings {
    pub(crate) fn configure(&self, agent: StructuredAgent) -> StructuredAgent {
        let agent = agent.with_retry(self.retry.clone());
        match self.timeout {
            Some(timeout) => agent.with_timeout(timeout),
            None => agent,
        }
    }
}

use super::AgentSettings;
use crate::ResolverError;
use llm::{ChatModel, StructuredAgent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Endpoint descriptions listed per candidate.
pub const MAX_PROFILE_CAPABILITIES: usize = 10;

const INSTRUCTIONS: &str = "You route one step of a larger task to the platform that can carry \
it out. Each candidate integration is listed with its id, its name when known, and a sample of \
what its API can do. Pick exactly one candidate. Respond with its id copied exactly, for example \
\"3f2a9c1e-...\", and nothing else.";

/// What the selector knows about one candidate integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationProfile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub capabilities: Vec<String>,
}

impl IntegrationProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            capabilities: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Keeps the first non-empty descriptions, up to the profile limit.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.trim().is_empty())
            .take(MAX_PROFILE_CAPABILITIES)
            .collect();
        self
    }
}

#[derive(Serialize)]
struct SelectInput<'a> {
    step: &'a str,
    candidates: &'a [IntegrationProfile],
}

#[derive(Deserialize)]
struct SelectOutput {
    integration_id: String,
}

/// Picks the integration that should run a step.
#[derive(Debug, Clone)]
pub struct IntegrationSelector {
    agent: StructuredAgent,
}

impl IntegrationSelector {
    pub fn new(settings: &AgentSettings) -> Self {
        let agent = StructuredAgent::new("integration_selector", INSTRUCTIONS)
            .input("step", "The step to carry out")
            .input("candidates", "Candidate integrations with id, name and capabilities")
            .output("integration_id", "Id of the chosen candidate");
        Self {
            agent: settings.configure(agent),
        }
    }

    /// Id of one of `candidates`. Never returns an id outside the set.
    pub async fn select(
        &self,
        model: &dyn ChatModel,
        step: &str,
        candidates: &[IntegrationProfile],
    ) -> crate::Result<String> {
        match candidates {
            [] => {
                return Err(ResolverError::Selection(
                    "no candidate integrations".to_string(),
                ))
            }
            [only] => {
                debug!(integration_id = %only.id, "Single candidate, skipping selection");
                return Ok(only.id.clone());
            }
            _ => {}
        }

        let output: SelectOutput = self
            .agent
            .invoke(model, &SelectInput { step, candidates })
            .await?;

        let answer = parse_response(&output.integration_id);
        match match_candidate(&answer, candidates) {
            Some(id) => {
                info!(integration_id = %id, "Selected integration for step");
                Ok(id)
            }
            None => Err(ResolverError::Selection(format!(
                "model chose '{}', which is not a candidate",
                answer
            ))),
        }
    }
}

/// First line of the answer without surrounding quotes or backticks.
fn parse_response(response: &str) -> String {
    response
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

fn match_candidate(answer: &str, candidates: &[IntegrationProfile]) -> Option<String> {
    if answer.is_empty() {
        return None;
    }

    let lowered = answer.to_lowercase();
    candidates
        .iter()
        .find(|c| c.id == answer)
        .or_else(|| candidates.iter().find(|c| c.id.to_lowercase() == lowered))
        .or_else(|| {
            candidates
                .iter()
                .filter(|c| lowered.contains(&c.id.to_lowercase()))
                .max_by_key(|c| c.id.len())
        })
        .map(|c| c.id.clone())
}

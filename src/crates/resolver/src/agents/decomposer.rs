use super::AgentSettings;
use crate::ResolverError;
use llm::{ChatModel, StructuredAgent};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default cap on the number of steps in a plan.
pub const DEFAULT_MAX_STEPS: usize = 8;

const INSTRUCTIONS: &str = "Break the user's request into an ordered list of steps. Every step \
must talk to exactly one external platform; reading, filtering or analysing data belongs to the \
step that fetches it, never to a step of its own. Keep steps in the order they have to happen and \
make each one understandable without the others.

Examples:

Query: 'Generate a report on all cancelled subscriptions and log them in Jira.'
Steps:
- 'Retrieve all cancelled subscriptions with their cancellation reasons from the subscription management system.'
- 'Create a Jira ticket for each cancelled subscription with the cancellation reason in the description.'

Query: 'Identify high-priority customer support tickets and notify the relevant team.'
Steps:
- 'Fetch the latest support tickets from Zendesk and keep those marked high priority.'
- 'Post a summary of the high-priority tickets in the team's Slack channel.'

Query: 'Summarize pending pull requests and notify developers.'
Steps:
- 'Retrieve all pending pull requests from GitHub with their status and assigned reviewers.'
- 'Send a summary of the pending pull requests to the development team on Slack.'

Query: 'Detect failed payment transactions and notify customers via email.'
Steps:
- 'Fetch failed payment transactions from Stripe for the last 24 hours.'
- 'Email each affected customer through SendGrid.'";

#[derive(Serialize)]
struct DecomposeInput<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct DecomposeOutput {
    #[serde(default)]
    steps: Vec<String>,
}

/// Splits a complex query into ordered single-platform steps.
#[derive(Debug, Clone)]
pub struct TaskDecomposer {
    agent: StructuredAgent,
    max_steps: usize,
}

impl TaskDecomposer {
    pub fn new(settings: &AgentSettings, max_steps: usize) -> Self {
        let agent = StructuredAgent::new("decomposer", INSTRUCTIONS)
            .input("query", "The user's request, possibly spanning several platforms")
            .output(
                "steps",
                "Ordered list of step descriptions, each requiring one platform interaction",
            );
        Self {
            agent: settings.configure(agent),
            max_steps: max_steps.max(1),
        }
    }

    pub async fn decompose(&self, model: &dyn ChatModel, query: &str) -> crate::Result<Vec<String>> {
        let output: DecomposeOutput = self.agent.invoke(model, &DecomposeInput { query }).await?;
        plan(output.steps, self.max_steps)
    }
}

fn plan(raw: Vec<String>, max_steps: usize) -> crate::Result<Vec<String>> {
    let mut steps: Vec<String> = raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if steps.is_empty() {
        return Err(ResolverError::Decomposition(
            "query produced no steps".to_string(),
        ));
    }

    if steps.len() > max_steps {
        warn!(planned = steps.len(), max_steps, "Truncating plan");
        steps.truncate(max_steps);
    }

    debug!(steps = steps.len(), "Decomposed query");
    Ok(steps)
}

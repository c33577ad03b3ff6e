use super::AgentSettings;
use llm::{ChatModel, StructuredAgent};
use serde::{Deserialize, Serialize};
use tracing::debug;

const INSTRUCTIONS: &str = "Rewrite the user's query so it can be matched against API endpoint \
descriptions. Follow the rephrasal instructions when they are given. Keep every concrete value \
(names, ids, amounts, dates) from the original query and do not add new requirements.";

#[derive(Serialize)]
struct RephraseInput<'a> {
    rephrasal_instructions: &'a str,
    query: &'a str,
}

#[derive(Deserialize)]
struct RephraseOutput {
    rephrased_query: String,
}

/// Optional rewrite of a raw query before retrieval.
#[derive(Debug, Clone)]
pub struct QueryRephraser {
    agent: StructuredAgent,
}

impl QueryRephraser {
    pub fn new(settings: &AgentSettings) -> Self {
        let agent = StructuredAgent::new("rephraser", INSTRUCTIONS)
            .input("rephrasal_instructions", "Caller instructions for rewriting the query; may be empty")
            .input("query", "The user's original query")
            .output("rephrased_query", "The rewritten query as a single sentence");
        Self {
            agent: settings.configure(agent),
        }
    }

    /// Rewritten query, or the original when the model returns nothing.
    pub async fn rephrase(
        &self,
        model: &dyn ChatModel,
        query: &str,
        instructions: Option<&str>,
    ) -> crate::Result<String> {
        let input = RephraseInput {
            rephrasal_instructions: instructions.unwrap_or_default(),
            query,
        };
        let output: RephraseOutput = self.agent.invoke(model, &input).await?;

        let rephrased = output.rephrased_query.trim();
        if rephrased.is_empty() {
            debug!("Rephraser returned nothing, keeping original query");
            return Ok(query.to_string());
        }
        Ok(rephrased.to_string())
    }
}

use super::AgentSettings;
use llm::{ChatModel, StructuredAgent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ANSWER_INSTRUCTIONS: &str = "Answer the user's query in natural language using only the \
supplied data. Use the structure description to interpret the data. Do not mention schemas, \
field types, endpoints or any other internal details.";

const CONTEXT_INSTRUCTIONS: &str = "Answer the user's query in natural language using only the \
supplied context.";

#[derive(Serialize)]
struct AnswerInput<'a> {
    query: &'a str,
    structure_of_data: &'a Value,
    data: &'a Value,
}

#[derive(Deserialize)]
struct AnswerOutput {
    natural_language_response: String,
}

#[derive(Serialize)]
struct ContextInput<'a> {
    query: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct ContextOutput {
    response: String,
}

/// Turns raw API data, or a free-text context, into an answer.
#[derive(Debug, Clone)]
pub struct ResponseSynthesizer {
    answer: StructuredAgent,
    from_context: StructuredAgent,
}

impl ResponseSynthesizer {
    pub fn new(settings: &AgentSettings) -> Self {
        let answer = StructuredAgent::new("response_synthesizer", ANSWER_INSTRUCTIONS)
            .input("query", "User query")
            .input(
                "structure_of_data",
                "Structure of the data that you will use to answer the user query",
            )
            .input("data", "Data that you will use to answer the user's query")
            .output(
                "natural_language_response",
                "Response to the user's query in natural language.",
            );

        let from_context = StructuredAgent::new("text_responder", CONTEXT_INSTRUCTIONS)
            .input("query", "User query")
            .input("context", "Context for answering the query")
            .output("response", "Response to the user's query in natural language.");

        Self {
            answer: settings.configure(answer),
            from_context: settings.configure(from_context),
        }
    }

    pub async fn answer(
        &self,
        model: &dyn ChatModel,
        query: &str,
        structure_of_data: &Value,
        data: &Value,
    ) -> crate::Result<String> {
        let input = AnswerInput {
            query,
            structure_of_data,
            data,
        };
        let output: AnswerOutput = self.answer.invoke(model, &input).await?;
        Ok(output.natural_language_response.trim().to_string())
    }

    pub async fn answer_from_context(
        &self,
        model: &dyn ChatModel,
        query: &str,
        context: &str,
    ) -> crate::Result<String> {
        let output: ContextOutput = self
            .from_context
            .invoke(model, &ContextInput { query, context })
            .await?;
        Ok(output.response.trim().to_string())
    }
}

//! Typed structured completion.
//!
//! A [`StructuredAgent`] pairs instructions with named input and output
//! fields. `invoke` serializes a typed input, asks the model for a JSON
//! object holding the output fields, and deserializes the answer.
//! `invoke_with_tools` runs the same contract with a bounded tool loop.
//!
//! ```rust,ignore
//! let agent = StructuredAgent::new("decomposer", "Split the query into steps.")
//!     .input("query", "User query")
//!     .output("steps", "Ordered list of step descriptions");
//!
//! let plan: Plan = agent.invoke(model.as_ref(), &DecomposeInput { query }).await?;
//! ```

use crate::chat::{ChatModel, ChatRequest, ChatResponse};
use crate::error::{LlmError, Result};
use crate::messages::Message;
use crate::parser::extract_json;
use crate::tools::ToolSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tooling::async_utils::{with_retry_if, with_timeout, RetryPolicy};
use tracing::debug;

/// Default cap on tool rounds before an answer is forced.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

const TOOL_GUIDANCE: &str = "You may call the available tools to look up values you need. \
When you have everything, reply with the JSON object and no tool calls.";

const FINAL_ANSWER_NUDGE: &str =
    "The tool budget is exhausted. Reply now with the JSON object using what you have.";

/// Named field in an agent's input or output contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
}

/// A language-model call constrained to declared input and output fields.
#[derive(Debug, Clone)]
pub struct StructuredAgent {
    name: String,
    instructions: String,
    inputs: Vec<FieldSpec>,
    outputs: Vec<FieldSpec>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    temperature: Option<f32>,
}

impl StructuredAgent {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            retry: RetryPolicy::none(),
            timeout: None,
            temperature: Some(0.0),
        }
    }

    pub fn input(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.inputs.push(FieldSpec {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.outputs.push(FieldSpec {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    /// Retry transient provider failures (timeouts, 429, 5xx).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deadline for each model call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outputs(&self) -> &[FieldSpec] {
        &self.outputs
    }

    /// System prompt describing the contract.
    pub fn system_prompt(&self, with_tools: bool) -> String {
        let mut prompt = self.instructions.trim().to_string();

        if !self.inputs.is_empty() {
            prompt.push_str("\n\nInput fields:");
            for field in &self.inputs {
                prompt.push_str(&format!("\n- `{}`: {}", field.name, field.description));
            }
        }

        prompt.push_str("\n\nRespond with a single JSON object containing exactly these fields:");
        for field in &self.outputs {
            prompt.push_str(&format!("\n- `{}`: {}", field.name, field.description));
        }
        prompt.push_str("\nReturn only the JSON object, without commentary.");

        if with_tools {
            prompt.push_str("\n\n");
            prompt.push_str(TOOL_GUIDANCE);
        }

        prompt
    }

    fn opening_messages<I: Serialize>(&self, input: &I, with_tools: bool) -> Result<Vec<Message>> {
        let rendered = serde_json::to_string_pretty(input)?;
        Ok(vec![
            Message::system(self.system_prompt(with_tools)),
            Message::human(format!("Input:\n{}", rendered)),
        ])
    }

    /// Single structured call.
    pub async fn invoke<I, O>(&self, model: &dyn ChatModel, input: &I) -> Result<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let messages = self.opening_messages(input, false)?;
        let response = self.complete(model, self.request(messages)).await?;
        self.parse_output(&response.message.content)
    }

    /// Structured call with up to `max_rounds` rounds of tool use.
    ///
    /// When the cap is reached one more call is made without tools to force
    /// an answer. Tool failures go back to the model as error results.
    pub async fn invoke_with_tools<I, O>(
        &self,
        model: &dyn ChatModel,
        input: &I,
        tools: &ToolSet,
        max_rounds: usize,
    ) -> Result<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        if tools.is_empty() || max_rounds == 0 {
            return self.invoke(model, input).await;
        }

        let mut messages = self.opening_messages(input, true)?;
        let definitions = tools.definitions();

        for round in 0..max_rounds {
            let request = self.request(messages.clone()).with_tools(definitions.clone());
            let response = self.complete(model, request).await?;

            let calls = response.message.requested_tools().to_vec();
            if calls.is_empty() {
                return self.parse_output(&response.message.content);
            }

            debug!(agent = %self.name, round, calls = calls.len(), "Model requested tools");
            messages.push(response.message);
            for call in &calls {
                let result = tools.execute(call).await;
                messages.push(Message::tool(result.to_json_string(), &call.id));
            }
        }

        debug!(agent = %self.name, max_rounds, "Tool budget exhausted, forcing answer");
        messages.push(Message::human(FINAL_ANSWER_NUDGE));
        let response = self.complete(model, self.request(messages)).await?;
        self.parse_output(&response.message.content)
    }

    fn request(&self, messages: Vec<Message>) -> ChatRequest {
        let request = ChatRequest::new(messages);
        match self.temperature {
            Some(temperature) => request.with_temperature(temperature),
            None => request,
        }
    }

    async fn complete(&self, model: &dyn ChatModel, request: ChatRequest) -> Result<ChatResponse> {
        let request = &request;
        let deadline = self.timeout;

        let attempt = || async move {
            match deadline {
                Some(limit) => with_timeout(limit, model.chat(request.clone()))
                    .await
                    .map_err(|e| {
                        e.into_inner_or(|after| {
                            LlmError::Timeout(format!("model call exceeded {:?}", after))
                        })
                    }),
                None => model.chat(request.clone()).await,
            }
        };

        with_retry_if(&self.retry, attempt, |e: &LlmError| e.is_retryable()).await
    }

    /// Decode the model's answer into the output type.
    ///
    /// With a single output field, a bare value (an object missing that
    /// field, an array, or plain text) is wrapped under the field name.
    pub fn parse_output<O: DeserializeOwned>(&self, text: &str) -> Result<O> {
        let single_field = match self.outputs.as_slice() {
            [only] => Some(only.name.as_str()),
            _ => None,
        };

        let value = match extract_json(text) {
            Some(json) => serde_json::from_str::<Value>(json).map_err(|e| {
                LlmError::InvalidResponse(format!("{} returned malformed JSON: {}", self.name, e))
            })?,
            None => match single_field {
                Some(field) if !text.trim().is_empty() => {
                    serde_json::json!({ field: text.trim() })
                }
                _ => {
                    return Err(LlmError::InvalidResponse(format!(
                        "{} returned no JSON object",
                        self.name
                    )))
                }
            },
        };

        let value = match (single_field, value) {
            (Some(field), Value::Object(map)) if !map.contains_key(field) => {
                serde_json::json!({ field: Value::Object(map) })
            }
            (Some(field), array @ Value::Array(_)) => serde_json::json!({ field: array }),
            (_, value) => value,
        };

        serde_json::from_value(value).map_err(|e| {
            LlmError::InvalidResponse(format!("{} output did not match contract: {}", self.name, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Steps {
        steps: Vec<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: i32,
        b: i32,
    }

    fn agent() -> StructuredAgent {
        StructuredAgent::new("decomposer", "Split the query.")
            .input("query", "User query")
            .output("steps", "Ordered steps")
    }

    #[test]
    fn test_system_prompt_lists_fields() {
        let prompt = agent().system_prompt(false);
        assert!(prompt.starts_with("Split the query."));
        assert!(prompt.contains("- `query`: User query"));
        assert!(prompt.contains("- `steps`: Ordered steps"));
        assert!(!prompt.contains("tools"));
        assert!(agent().system_prompt(true).contains("tools"));
    }

    #[test]
    fn test_parse_wrapped_output() {
        let parsed: Steps = agent().parse_output(r#"{"steps": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.steps, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_fenced_output() {
        let parsed: Steps = agent()
            .parse_output("```json\n{\"steps\": [\"x\"]}\n```")
            .unwrap();
        assert_eq!(parsed.steps, vec!["x"]);
    }

    #[test]
    fn test_parse_bare_array_single_field() {
        let parsed: Steps = agent().parse_output(r#"["step a","step b"]"#).unwrap();
        assert_eq!(parsed.steps, vec!["step a", "step b"]);
    }

    #[test]
    fn test_parse_plain_text_single_field() {
        #[derive(Deserialize)]
        struct Answer {
            response: String,
        }
        let agent = StructuredAgent::new("responder", "Answer").output("response", "Answer text");
        let parsed: Answer = agent.parse_output("The cart has 2 items.").unwrap();
        assert_eq!(parsed.response, "The cart has 2 items.");
    }

    #[test]
    fn test_parse_bare_object_single_field() {
        #[derive(Deserialize)]
        struct Params {
            request_parameters: serde_json::Value,
        }
        let agent = StructuredAgent::new("params", "Fill").output("request_parameters", "Values");
        let parsed: Params = agent.parse_output(r#"{"id": 3}"#).unwrap();
        assert_eq!(parsed.request_parameters["id"], 3);
    }

    #[test]
    fn test_parse_multi_field_requires_object() {
        let agent = StructuredAgent::new("pair", "Pair").output("a", "A").output("b", "B");
        let parsed: Pair = agent.parse_output(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(parsed, Pair { a: 1, b: 2 });
        assert!(agent.parse_output::<Pair>("no json").is_err());
    }

    #[test]
    fn test_parse_mismatched_contract() {
        let err = agent().parse_output::<Steps>(r#"{"steps": "not a list"}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}

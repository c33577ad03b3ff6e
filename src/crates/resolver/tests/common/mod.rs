//! Common test utilities and setup

#![allow(dead_code)]

use async_trait::async_trait;
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message, MessageRole, Result, ToolCall};
use resolver::{ActionExecutor, InMemoryIndex, Pipeline, PipelineSettings, SemanticIndex};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Output field markers as they appear in each stage's system prompt.
pub const REPHRASE: &str = "`rephrased_query`";
pub const FILTER: &str = "`filtered_endpoints`";
pub const PARAMETERS: &str = "`request_parameters`";
pub const BODY: &str = "`request_body`";
pub const ANSWER: &str = "`natural_language_response`";
pub const CONTEXT_ANSWER: &str = "`response`";
pub const DECOMPOSE: &str = "`steps`";
pub const SELECT: &str = "`integration_id`";

const MARKERS: [&str; 8] = [
    REPHRASE,
    FILTER,
    PARAMETERS,
    BODY,
    ANSWER,
    CONTEXT_ANSWER,
    DECOMPOSE,
    SELECT,
];

#[derive(Clone)]
pub enum Reply {
    Text(String),
    Tools(Vec<ToolCall>),
}

#[derive(Default)]
struct Script {
    routes: HashMap<&'static str, VecDeque<Reply>>,
    requests: Vec<(&'static str, ChatRequest)>,
}

/// Mock model that answers by stage.
///
/// The stage is recognised from the output field named in the system
/// prompt. Replies queue per stage; the last reply of a stage repeats.
#[derive(Clone, Default)]
pub struct RoutedModel {
    script: Arc<Mutex<Script>>,
}

impl RoutedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, marker: &'static str, text: impl Into<String>) -> Self {
        self.push(marker, Reply::Text(text.into()))
    }

    pub fn reply_tools(self, marker: &'static str, calls: Vec<ToolCall>) -> Self {
        self.push(marker, Reply::Tools(calls))
    }

    fn push(self, marker: &'static str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .routes
            .entry(marker)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self, marker: &str) -> usize {
        self.requests_for(marker).len()
    }

    pub fn requests_for(&self, marker: &str) -> Vec<ChatRequest> {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, _)| *m == marker)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Text of the human input message of every request to a stage.
    pub fn inputs_for(&self, marker: &str) -> Vec<String> {
        self.requests_for(marker)
            .iter()
            .filter_map(|r| {
                r.messages
                    .iter()
                    .find(|m| m.role == MessageRole::Human)
                    .map(|m| m.content.clone())
            })
            .collect()
    }
}

fn stage_of(request: &ChatRequest) -> Option<&'static str> {
    let system = request
        .messages
        .iter()
        .find(|m| m.role == MessageRole::System)?;
    MARKERS
        .iter()
        .copied()
        .find(|marker| system.content.contains(marker))
}

#[async_trait]
impl ChatModel for RoutedModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let stage = stage_of(&request)
            .ok_or_else(|| LlmError::InvalidRequest("request matches no stage".into()))?;

        let mut script = self.script.lock().unwrap();
        script.requests.push((stage, request));

        let queue = script
            .routes
            .get_mut(stage)
            .ok_or_else(|| LlmError::InvalidRequest(format!("no reply scripted for {}", stage)))?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
        .ok_or_else(|| LlmError::InvalidRequest(format!("no reply scripted for {}", stage)))?;

        let message = match reply {
            Reply::Text(text) => Message::assistant(text),
            Reply::Tools(calls) => Message::assistant("").with_tool_calls(calls),
        };
        Ok(ChatResponse::new(message))
    }

    fn model_name(&self) -> &str {
        "routed-mock"
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

/// Filterer reply selecting the given `(method, url)` pairs.
pub fn filter_reply(selected: &[(&str, &str)]) -> String {
    let endpoints: Vec<Value> = selected
        .iter()
        .map(|(method, url)| serde_json::json!({ "method": method, "url": url, "description": "" }))
        .collect();
    serde_json::json!({ "filtered_endpoints": endpoints }).to_string()
}

pub fn executor() -> Arc<ActionExecutor> {
    Arc::new(ActionExecutor::new(Duration::from_secs(5)).unwrap())
}

pub fn pipeline(index: InMemoryIndex) -> Pipeline {
    let index: Arc<dyn SemanticIndex> = Arc::new(index);
    Pipeline::new(index, executor(), &PipelineSettings::default())
}

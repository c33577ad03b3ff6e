//! Router fixtures: scripted models, a counting provider and app state

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use gateway::auth::digest_key;
use gateway::config::ApiKeyEntry;
use gateway::{create_router, AppState, StaticKeyValidator};
use llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message, MessageRole, ModelProvider};
use resolver::{
    ActionExecutor, InMemoryIndex, InMemoryRegistry, Integration, Pipeline, PipelineSettings,
    StepOrchestrator,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const API_KEY: &str = "kr-test-key";
pub const LIMITED_KEY: &str = "kr-limited-key";

pub const FILTER: &str = "`filtered_endpoints`";
pub const ANSWER: &str = "`natural_language_response`";
pub const CONTEXT_ANSWER: &str = "`response`";
pub const DECOMPOSE: &str = "`steps`";
pub const SELECT: &str = "`integration_id`";
pub const BODY: &str = "`request_body`";

const MARKERS: [&str; 6] = [FILTER, ANSWER, CONTEXT_ANSWER, DECOMPOSE, SELECT, BODY];

/// Replies by stage, recognised from the output field in the system prompt.
/// The last reply queued for a stage repeats.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<HashMap<&'static str, VecDeque<String>>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, marker: &'static str, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(marker)
            .or_default()
            .push_back(text.into());
        self
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> llm::Result<ChatResponse> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let stage = MARKERS
            .iter()
            .copied()
            .find(|marker| system.contains(marker))
            .ok_or_else(|| LlmError::InvalidRequest("request matches no stage".into()))?;

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(stage)
            .ok_or_else(|| LlmError::InvalidRequest(format!("no reply scripted for {}", stage)))?;
        let text = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
        .unwrap_or_default();

        Ok(ChatResponse::new(Message::assistant(text)))
    }

    fn model_name(&self) -> &str {
        "scripted-mock"
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

/// Hands out the scripted model and counts how often it was asked to.
pub struct ScriptedProvider {
    model: ScriptedModel,
    pub builds: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(model: ScriptedModel) -> Self {
        Self {
            model,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelProvider for ScriptedProvider {
    fn model_for(&self, model_id: &str, _api_key: &str) -> llm::Result<Arc<dyn ChatModel>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if model_id.starts_with("nowhere/") {
            return Err(LlmError::ModelNotFound(format!("unsupported provider in '{}'", model_id)));
        }
        Ok(Arc::new(self.model.clone()))
    }
}

pub fn app(index: InMemoryIndex, provider: Arc<ScriptedProvider>) -> Router {
    let settings = PipelineSettings::default();
    let executor = Arc::new(ActionExecutor::new(Duration::from_secs(5)).unwrap());
    let pipeline = Pipeline::new(Arc::new(index), executor, &settings);
    let registry: InMemoryRegistry = vec![
        Integration::new("subs", "Billing"),
        Integration::new("jira", "Jira"),
    ]
    .into_iter()
    .collect();
    let orchestrator = StepOrchestrator::new(pipeline.clone(), Arc::new(registry), &settings);

    let auth = StaticKeyValidator::new(vec![
        ApiKeyEntry {
            name: "tester".into(),
            sha256: digest_key(API_KEY),
            monthly_limit: None,
        },
        ApiKeyEntry {
            name: "limited".into(),
            sha256: digest_key(LIMITED_KEY),
            monthly_limit: Some(0),
        },
    ]);

    create_router(AppState {
        pipeline,
        orchestrator,
        models: provider,
        auth: Arc::new(auth),
        shutdown: CancellationToken::new(),
    })
}

pub fn llm_config() -> Value {
    json!({"llm": "openai/gpt-4o-mini", "llm_api_key": "sk-test"})
}

pub fn filter_reply(selected: &[(&str, &str)]) -> String {
    let endpoints: Vec<Value> = selected
        .iter()
        .map(|(method, url)| json!({ "method": method, "url": url, "description": "" }))
        .collect();
    json!({ "filtered_endpoints": endpoints }).to_string()
}

/// POST a JSON body, optionally with an `api-key` header.
pub async fn post(app: Router, uri: &str, key: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        request = request.header("api-key", key);
    }
    let request = request.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

//! Provider-agnostic chat model trait and request/response types.
//!
//! Providers implement [`ChatModel`]; callers share them as
//! `Arc<dyn ChatModel>`.
//!
//! ```rust,ignore
//! let request = ChatRequest::new(vec![
//!     Message::system("Answer in JSON"),
//!     Message::human("List two colors"),
//! ])
//! .with_temperature(0.0);
//!
//! let response = model.chat(request).await?;
//! println!("{}", response.message.content);
//! ```

use crate::error::Result;
use crate::messages::Message;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use std::collections::HashMap;

/// Core trait for chat-based language models.
///
/// Implementations convert messages to the provider format, make the call and
/// convert the answer back. Tool calls requested by the model are returned in
/// `response.message.tool_calls`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete chat response from messages.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Check if the model/provider is available.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Model identifier used for logging.
    fn model_name(&self) -> &str;

    /// Clone this model into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A request to a chat model containing messages and configuration.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Bind tools the model may call.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.config.tools = tools;
        self
    }
}

/// Generation parameters. Providers ignore the ones they do not support.
#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub tools: Vec<ToolDefinition>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl UsageMetadata {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Complete response from a chat model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
            metadata: HashMap::new(),
        }
    }
}

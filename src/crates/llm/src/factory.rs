//! Per-request model construction.
//!
//! Callers pass a model identifier and their own credential with every
//! request; the factory turns that pair into a ready client. Nothing is
//! cached, so no credential outlives the request that supplied it.

use crate::chat::ChatModel;
use crate::config::{RemoteLlmConfig, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_OPENAI_BASE_URL};
use crate::error::{LlmError, Result};
use crate::remote::{ClaudeClient, OpenAiClient};
use std::sync::Arc;
use std::time::Duration;

/// Provider families reachable through [`LlmFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Split `"provider/model"` into its parts.
    ///
    /// Unprefixed ids starting with `claude` go to Anthropic; everything
    /// else is treated as OpenAI-compatible.
    pub fn parse_model_id(model_id: &str) -> Result<(Provider, String)> {
        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(LlmError::ModelNotFound("empty model identifier".into()));
        }

        match model_id.split_once('/') {
            Some((prefix, model)) if !model.is_empty() => {
                let provider = match prefix.to_ascii_lowercase().as_str() {
                    "openai" => Provider::OpenAi,
                    "anthropic" | "claude" => Provider::Anthropic,
                    other => {
                        return Err(LlmError::ModelNotFound(format!(
                            "unsupported provider '{}'",
                            other
                        )))
                    }
                };
                Ok((provider, model.to_string()))
            }
            Some(_) => Err(LlmError::ModelNotFound(format!(
                "missing model name in '{}'",
                model_id
            ))),
            None if model_id.starts_with("claude") => {
                Ok((Provider::Anthropic, model_id.to_string()))
            }
            None => Ok((Provider::OpenAi, model_id.to_string())),
        }
    }
}

/// Builds a chat model for one request.
pub trait ModelProvider: Send + Sync {
    fn model_for(&self, model_id: &str, api_key: &str) -> Result<Arc<dyn ChatModel>>;
}

/// Default [`ModelProvider`] for the bundled remote clients.
#[derive(Debug, Clone)]
pub struct LlmFactory {
    openai_base_url: String,
    anthropic_base_url: String,
    timeout: Duration,
}

impl LlmFactory {
    pub fn new() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = url.into();
        self
    }

    pub fn with_anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.anthropic_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for LlmFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelProvider for LlmFactory {
    fn model_for(&self, model_id: &str, api_key: &str) -> Result<Arc<dyn ChatModel>> {
        if api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound("llm_api_key is empty".into()));
        }

        let (provider, model) = Provider::parse_model_id(model_id)?;
        tracing::debug!(?provider, %model, "Building chat model");

        match provider {
            Provider::OpenAi => {
                let config = RemoteLlmConfig::new(api_key, &self.openai_base_url, model)
                    .with_timeout(self.timeout);
                Ok(Arc::new(OpenAiClient::new(config)?))
            }
            Provider::Anthropic => {
                let config = RemoteLlmConfig::new(api_key, &self.anthropic_base_url, model)
                    .with_timeout(self.timeout);
                Ok(Arc::new(ClaudeClient::new(config)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_id() {
        assert_eq!(
            Provider::parse_model_id("openai/gpt-4o-mini").unwrap(),
            (Provider::OpenAi, "gpt-4o-mini".to_string())
        );
        assert_eq!(
            Provider::parse_model_id("anthropic/claude-3-5-sonnet-latest").unwrap(),
            (Provider::Anthropic, "claude-3-5-sonnet-latest".to_string())
        );
        assert_eq!(
            Provider::parse_model_id("claude-3-haiku").unwrap().0,
            Provider::Anthropic
        );
        assert_eq!(Provider::parse_model_id("gpt-4o").unwrap().0, Provider::OpenAi);
    }

    #[test]
    fn test_parse_model_id_rejects_bad_input() {
        assert!(Provider::parse_model_id("").is_err());
        assert!(Provider::parse_model_id("mystery/model").is_err());
        assert!(Provider::parse_model_id("openai/").is_err());
    }

    #[test]
    fn test_factory_requires_key() {
        let factory = LlmFactory::new();
        let err = factory.model_for("openai/gpt-4o", " ").err().unwrap();
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_factory_builds_named_model() {
        let factory = LlmFactory::new().with_openai_base_url("http://localhost:9999/v1");
        let model = factory.model_for("openai/gpt-4o-mini", "sk-test").unwrap();
        assert_eq!(model.model_name(), "gpt-4o-mini");

        let model = factory.model_for("anthropic/claude-3-haiku", "sk-ant").unwrap();
        assert_eq!(model.model_name(), "claude-3-haiku");
    }
}

//! Server configuration for gateway-server
//!
//! Loads `gateway.toml`, then applies `KRAMEN_*` environment overrides.

use resolver::{Integration, PipelineSettings, QdrantConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tooling::async_utils::RetryPolicy;
use tooling::config::{ConfigBuilder, EnvOverrides};
use tooling::ToolingError;

/// Variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "KRAMEN_CONFIG";
/// Prefix of override variables (`KRAMEN_PORT`, `KRAMEN_QDRANT_URL`, ...).
pub const ENV_PREFIX: &str = "KRAMEN_";
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Environment override failed: {0}")]
    Env(#[from] ToolingError),
}

/// A caller credential, stored as the SHA-256 hex digest of the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub name: String,
    pub sha256: String,
    /// Requests allowed per calendar month; unlimited when absent
    #[serde(default)]
    pub monthly_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,

    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub qdrant_vector_name: Option<String>,
    pub embedding_model: String,

    pub retrieval_limit: usize,
    pub max_tool_rounds: usize,
    pub max_steps: usize,

    /// Target API call deadline
    pub http_timeout_secs: u64,
    /// Per model call deadline
    pub llm_timeout_secs: u64,
    /// Total attempts per model call; 1 disables retry
    pub llm_retry_attempts: usize,

    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,

    pub api_keys: Vec<ApiKeyEntry>,
    pub integrations: Vec<Integration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            qdrant_vector_name: None,
            embedding_model: "sentence-transformers/all-minilm-l6-v2".to_string(),
            retrieval_limit: 5,
            max_tool_rounds: 5,
            max_steps: 8,
            http_timeout_secs: 30,
            llm_timeout_secs: 60,
            llm_retry_attempts: 1,
            openai_base_url: None,
            anthropic_base_url: None,
            api_keys: Vec::new(),
            integrations: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GatewayConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GatewayConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, GatewayConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// File named by `KRAMEN_CONFIG`, else `config/gateway.toml` when it
    /// exists, else defaults; then environment overrides and validation.
    pub fn load() -> Result<Self, GatewayConfigError> {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => Self::load_from(Some(Path::new(&path))),
            _ => Self::load_from(None),
        }
    }

    /// Like [`GatewayConfig::load`] with an explicit file.
    pub fn load_from(path: Option<&Path>) -> Result<Self, GatewayConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => Self::default(),
        };

        config.apply_env(&EnvOverrides::new(ENV_PREFIX))?;
        config.check()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &EnvOverrides) -> Result<(), GatewayConfigError> {
        env.apply_string("HOST", &mut self.host)?;
        env.apply_parse("PORT", &mut self.port)?;
        env.apply_string("QDRANT_URL", &mut self.qdrant_url)?;
        env.apply_optional("QDRANT_API_KEY", &mut self.qdrant_api_key)?;
        env.apply_optional("QDRANT_VECTOR_NAME", &mut self.qdrant_vector_name)?;
        env.apply_string("EMBEDDING_MODEL", &mut self.embedding_model)?;
        env.apply_parse("RETRIEVAL_LIMIT", &mut self.retrieval_limit)?;
        env.apply_parse("MAX_TOOL_ROUNDS", &mut self.max_tool_rounds)?;
        env.apply_parse("MAX_STEPS", &mut self.max_steps)?;
        env.apply_parse("HTTP_TIMEOUT_SECS", &mut self.http_timeout_secs)?;
        env.apply_parse("LLM_TIMEOUT_SECS", &mut self.llm_timeout_secs)?;
        env.apply_parse("LLM_RETRY_ATTEMPTS", &mut self.llm_retry_attempts)?;
        env.apply_optional("OPENAI_BASE_URL", &mut self.openai_base_url)?;
        env.apply_optional("ANTHROPIC_BASE_URL", &mut self.anthropic_base_url)?;
        Ok(())
    }

    pub fn check(&self) -> Result<(), GatewayConfigError> {
        self.validate()
            .map_err(|e| GatewayConfigError::InvalidConfig(e.to_string()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn qdrant(&self) -> QdrantConfig {
        QdrantConfig::new(&self.qdrant_url, &self.embedding_model)
            .with_api_key(self.qdrant_api_key.clone())
            .with_vector_name(self.qdrant_vector_name.clone())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            retrieval_limit: self.retrieval_limit,
            max_tool_rounds: self.max_tool_rounds,
            max_steps: self.max_steps,
            retry: RetryPolicy::new(self.llm_retry_attempts),
            llm_timeout: Some(self.llm_timeout()),
        }
    }
}

impl ConfigBuilder for GatewayConfig {
    fn validate(&self) -> tooling::Result<()> {
        let invalid = |msg: String| Err(ToolingError::General(msg));

        if self.qdrant_url.trim().is_empty() {
            return invalid("qdrant_url must not be empty".into());
        }
        if self.embedding_model.trim().is_empty() {
            return invalid("embedding_model must not be empty".into());
        }
        for (name, value) in [
            ("retrieval_limit", self.retrieval_limit),
            ("max_steps", self.max_steps),
            ("llm_retry_attempts", self.llm_retry_attempts),
        ] {
            if value == 0 {
                return invalid(format!("{} must be at least 1", name));
            }
        }
        if self.http_timeout_secs == 0 || self.llm_timeout_secs == 0 {
            return invalid("timeouts must be at least one second".into());
        }
        for key in &self.api_keys {
            let well_formed = key.sha256.len() == 64 && key.sha256.chars().all(|c| c.is_ascii_hexdigit());
            if !well_formed {
                return invalid(format!("api key '{}' must carry a 64 character sha256 hex digest", key.name));
            }
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> tooling::Result<Self> {
        let mut config = Self::default();
        config
            .apply_env(&EnvOverrides::new(prefix))
            .map_err(|e| ToolingError::General(e.to_string()))?;
        Ok(config)
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        let defaults = Self::default();
        if other.host != defaults.host {
            self.host = other.host;
        }
        if other.port != defaults.port {
            self.port = other.port;
        }
        if other.qdrant_url != defaults.qdrant_url {
            self.qdrant_url = other.qdrant_url;
        }
        if other.qdrant_api_key.is_some() {
            self.qdrant_api_key = other.qdrant_api_key;
        }
        if other.qdrant_vector_name.is_some() {
            self.qdrant_vector_name = other.qdrant_vector_name;
        }
        if other.embedding_model != defaults.embedding_model {
            self.embedding_model = other.embedding_model;
        }
        if other.retrieval_limit != defaults.retrieval_limit {
            self.retrieval_limit = other.retrieval_limit;
        }
        if other.max_tool_rounds != defaults.max_tool_rounds {
            self.max_tool_rounds = other.max_tool_rounds;
        }
        if other.max_steps != defaults.max_steps {
            self.max_steps = other.max_steps;
        }
        if other.http_timeout_secs != defaults.http_timeout_secs {
            self.http_timeout_secs = other.http_timeout_secs;
        }
        if other.llm_timeout_secs != defaults.llm_timeout_secs {
            self.llm_timeout_secs = other.llm_timeout_secs;
        }
        if other.llm_retry_attempts != defaults.llm_retry_attempts {
            self.llm_retry_attempts = other.llm_retry_attempts;
        }
        if other.openai_base_url.is_some() {
            self.openai_base_url = other.openai_base_url;
        }
        if other.anthropic_base_url.is_some() {
            self.anthropic_base_url = other.anthropic_base_url;
        }
        if !other.api_keys.is_empty() {
            self.api_keys = other.api_keys;
        }
        if !other.integrations.is_empty() {
            self.integrations = other.integrations;
        }
        self
    }
}

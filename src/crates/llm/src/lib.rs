//! Chat model plumbing for kramen.
//!
//! This crate provides the [`ChatModel`] trait, two remote providers
//! (OpenAI-compatible and Anthropic), a per-request [`LlmFactory`], and
//! [`StructuredAgent`], which turns a prompt contract with named input and
//! output fields into a typed call.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::{LlmFactory, ModelProvider, StructuredAgent};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct Input { query: String }
//!
//! #[derive(Deserialize)]
//! struct Output { rephrased_query: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = LlmFactory::new().model_for("openai/gpt-4o-mini", "sk-...")?;
//!
//!     let agent = StructuredAgent::new("rephraser", "Rewrite the query for one platform.")
//!         .input("query", "User query")
//!         .output("rephrased_query", "Query rewritten for the platform");
//!
//!     let out: Output = agent
//!         .invoke(model.as_ref(), &Input { query: "open PRs".into() })
//!         .await?;
//!     println!("{}", out.rephrased_query);
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod factory;
pub mod messages;
pub mod parser;
pub mod remote;
pub mod structured;
pub mod tools;

pub use chat::{ChatConfig, ChatModel, ChatRequest, ChatResponse, UsageMetadata};
pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use factory::{LlmFactory, ModelProvider, Provider};
pub use messages::{Message, MessageRole};
pub use parser::extract_json;
pub use structured::{FieldSpec, StructuredAgent, DEFAULT_MAX_TOOL_ROUNDS};
pub use tools::{Tool, ToolCall, ToolDefinition, ToolResult, ToolSet};

//! Remote LLM provider implementations.
//!
//! - **OpenAI** - `/chat/completions` and any compatible endpoint
//! - **Claude** - Anthropic's messages API

pub mod claude;
pub mod openai;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;

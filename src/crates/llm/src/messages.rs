//! Conversation messages exchanged with chat models.

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message sender.
///
/// Serializes to lowercase strings (`"system"`, `"human"`, `"assistant"`,
/// `"tool"`); providers map these to their own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions and constraints for the model.
    System,
    /// End-user input.
    Human,
    /// Model output, possibly carrying tool calls.
    Assistant,
    /// Result of a tool call, linked by `tool_call_id`.
    Tool,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub role: MessageRole,

    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Call this tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new message with the given role and content
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageRole::Tool, content)
        }
    }

    /// Set tool calls (for assistant messages)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        };
        self
    }

    /// Text content, `None` when empty
    pub fn text(&self) -> Option<&str> {
        if self.content.is_empty() {
            None
        } else {
            Some(&self.content)
        }
    }

    /// Tool calls requested by this message, empty when none
    pub fn requested_tools(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        assert_eq!(Message::system("s").role, MessageRole::System);
        assert_eq!(Message::human("h").role, MessageRole::Human);
        assert_eq!(Message::assistant("a").text(), Some("a"));

        let tool = Message::tool("{}", "call_1");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool.id.is_some());
    }

    #[test]
    fn test_empty_tool_calls_collapse() {
        let msg = Message::assistant("").with_tool_calls(vec![]);
        assert!(msg.tool_calls.is_none());
        assert!(msg.requested_tools().is_empty());
        assert!(msg.text().is_none());

        let msg = Message::assistant("").with_tool_calls(vec![ToolCall::new("c", "t", json!({}))]);
        assert_eq!(msg.requested_tools().len(), 1);
    }

    #[test]
    fn test_role_serialization() {
        let value = serde_json::to_value(MessageRole::Assistant).unwrap();
        assert_eq!(value, json!("assistant"));
    }
}

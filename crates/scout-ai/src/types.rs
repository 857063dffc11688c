//! Core types shared by all provider adapters
//!
//! Requests and responses are expressed in one canonical shape; each adapter
//! converts to and from its provider's wire format at the edge.

use serde::{Deserialize, Serialize};

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Google,
    Ollama,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Environment variable holding the API key, if the provider needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Google => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }
}

/// Configuration for constructing a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Override the default API endpoint (OpenAI-compatible servers, Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Explicit API key; falls back to the provider's environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ModelConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            api_key: None,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A tool made available to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub parameters: serde_json::Value,
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
        /// Set when the tool failed; content then carries the error text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            error: None,
        }
    }

    pub fn tool_error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {message}"),
            error: Some(message),
        }
    }
}

/// Token usage accumulated across a request or a whole conversation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn
    Stop,
    /// Hit the max_tokens limit
    Length,
    /// Stopped to call tools
    ToolUse,
    /// Provider reported an error
    Error,
}

/// A chat completion request in canonical form
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDef>,
    pub max_tokens: u32,
}

/// A complete (non-streaming) chat response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_serde_roundtrip() {
        let messages = vec![
            Message::user("What does the parser do?"),
            Message::assistant(
                Some("Let me look.".into()),
                vec![ToolCall::new("call_1", "grep", json!({"pattern": "parse"}))],
            ),
            Message::tool_result("call_1", "Found 3 matches"),
        ];
        let encoded = serde_json::to_string(&messages).unwrap();
        let decoded: Vec<Message> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_message_role_tags() {
        let v = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(v["role"], "user");

        let v = serde_json::to_value(Message::tool_error("call_9", "boom")).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["content"], "Error: boom");
        assert_eq!(v["error"], "boom");
    }

    #[test]
    fn test_assistant_omits_empty_fields() {
        let v = serde_json::to_value(Message::assistant(None, vec![])).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("content"));
        assert!(!obj.contains_key("tool_calls"));
    }

    #[test]
    fn test_usage_add() {
        let mut total = Usage::default();
        total.add(&Usage {
            input_tokens: 100,
            output_tokens: 20,
            total_tokens: 120,
        });
        total.add(&Usage {
            input_tokens: 50,
            output_tokens: 5,
            total_tokens: 55,
        });
        assert_eq!(total.input_tokens, 150);
        assert_eq!(total.total_tokens, 175);
    }
}

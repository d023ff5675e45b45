//! Conversation types and the model-service seam.
//!
//! # Modules
//!
//! - [`error`]  - `ProviderError` and its transient/fatal classification
//! - [`openai`] - `OpenAiClient`, a chat-completions client over reqwest

pub mod error;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolDeclaration;

pub use error::{ProviderError, ProviderErrorKind, TRANSIENT_MARKERS};
pub use openai::OpenAiClient;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of a conversation. Conversations only ever grow during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Tool calls carried by an assistant message (at most one is ever kept).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Call id a tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_call: Option<ToolCall>) -> Self {
        Self {
            tool_calls: tool_call.into_iter().collect(),
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// A tool invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument text exactly as the model produced it.
    pub arguments: String,
}

/// Tool-call arguments that are not a JSON object.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentDecodeError {
    #[error("Invalid tool arguments: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid tool arguments: expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the raw argument text. Empty text is treated as `{}`.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, ArgumentDecodeError> {
        let raw = self.arguments.trim();
        if raw.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            other => Err(ArgumentDecodeError::NotAnObject(json_type_name(&other))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How the model may choose tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
}

/// One request to the model service.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDeclaration],
    pub tool_choice: ToolChoice,
    /// `Some(false)` asks the service to propose at most one tool call.
    /// `None` leaves the field out for services that do not support it.
    pub parallel_tool_calls: Option<bool>,
}

/// The assistant turn returned by the model service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content,
            tool_calls,
        }
    }
}

/// Model service: takes a conversation plus tool declarations, returns one assistant turn.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    async fn complete(&self, request: &ModelRequest<'_>) -> Result<AssistantReply, ProviderError>;
}

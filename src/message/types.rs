// ABOUTME: Canonical message model - messages, tool calls, deltas, and the
// ABOUTME: request/response envelopes shared by every provider codec.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::MessageContent;
use super::extra::Extra;

/// Canonical role names. Roles are open strings; providers may add others.
pub mod role {
    pub const SYSTEM: &str = "system";
    pub const DEVELOPER: &str = "developer";
    pub const USER: &str = "user";
    pub const ASSISTANT: &str = "assistant";
    pub const TOOL: &str = "tool";
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub name: String,
    /// Raw serialized argument payload; never parsed by the model layer.
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ToolCall {
    /// Create a tool call with an id.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            arguments: arguments.into(),
            ..Default::default()
        }
    }
}

/// One conversation turn in provider-independent form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Correlates a `tool` message with the tool call it answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
    /// Hidden analysis channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Provider-namespaced side channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(role::SYSTEM, content)
    }

    /// Create a developer message.
    pub fn developer(content: impl Into<MessageContent>) -> Self {
        Self::new(role::DEVELOPER, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(role::USER, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(role::ASSISTANT, content)
    }

    /// Create a tool result message answering the call `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            call_id: Some(call_id.into()),
            ..Self::new(role::TOOL, content)
        }
    }

    /// Attach tool calls.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Set the sender name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reasoning channel.
    pub fn with_reasoning(mut self, reasoning: impl Into<MessageContent>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Tool calls, or an empty slice.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// A copy of this message without its id.
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Remove ids from every message.
pub fn strip_message_ids(messages: &[Message]) -> Vec<Message> {
    messages.iter().map(Message::without_id).collect()
}

/// Replace message ids found in `id_map`; other messages are copied unchanged.
pub fn map_message_ids(id_map: &HashMap<String, String>, messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| {
            let mut m = m.clone();
            if let Some(new_id) = m.id.as_ref().and_then(|id| id_map.get(id)) {
                m.id = Some(new_id.clone());
            }
            m
        })
        .collect()
}

/// Incremental fragment of a tool call, keyed by `index`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Normalized partial update to an in-progress message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDelta {
    pub role: Option<String>,
    pub content: Option<MessageContent>,
    pub reasoning: Option<MessageContent>,
    pub refusal: Option<MessageContent>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl MessageDelta {
    /// A delta that only sets the role.
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Default::default()
        }
    }

    /// A delta carrying a content fragment.
    pub fn content(content: impl Into<MessageContent>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A delta carrying a reasoning fragment.
    pub fn reasoning(reasoning: impl Into<MessageContent>) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            ..Default::default()
        }
    }

    /// A delta carrying a refusal fragment.
    pub fn refusal(refusal: impl Into<MessageContent>) -> Self {
        Self {
            refusal: Some(refusal.into()),
            ..Default::default()
        }
    }

    /// A delta carrying a single tool call fragment.
    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            tool_calls: Some(vec![delta]),
            ..Default::default()
        }
    }

    /// True if applying this delta cannot change anything.
    pub fn is_empty(&self) -> bool {
        self.role.as_deref().is_none_or(str::is_empty)
            && self.content.as_ref().is_none_or(MessageContent::is_empty)
            && self.reasoning.as_ref().is_none_or(MessageContent::is_empty)
            && self.refusal.as_ref().is_none_or(MessageContent::is_empty)
            && self.tool_calls.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Why the model stopped generating.
///
/// Providers' reasons are normalized into the first four variants; anything
/// else passes through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Wire name of the reason.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: serde_json::Value,
}

impl FunctionDefinition {
    /// Create a function definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Named JSON schema for structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Request envelope for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<FunctionDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,
}

impl StepParams {
    /// Create params from a list of messages.
    pub fn new(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Add a message.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add a function definition.
    pub fn function(mut self, function: FunctionDefinition) -> Self {
        self.functions.get_or_insert_with(Vec::new).push(function);
        self
    }

    /// Request structured output.
    pub fn response_schema(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.response_schema = Some(ResponseSchema {
            name: name.into(),
            schema,
        });
        self
    }

    /// Function definitions, or an empty slice.
    pub fn functions(&self) -> &[FunctionDefinition] {
        self.functions.as_deref().unwrap_or_default()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

/// Response identity reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl StepMetadata {
    /// True if neither field is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.model.is_none()
    }
}

/// Result envelope for one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StepMetadata>,
}

impl StepResult {
    /// The first message, normally the single assistant reply.
    pub fn message(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Concatenated text of the first message's content.
    pub fn text(&self) -> String {
        self.message().map(|m| m.content.to_text()).unwrap_or_default()
    }

    /// Check if the first message requests tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.message().is_some_and(|m| !m.tool_calls().is_empty())
    }
}

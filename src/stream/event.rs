// ABOUTME: Event vocabulary emitted while decoding a streamed step.
// ABOUTME: Serializes with the dotted `type` tags used on the wire.

use serde::{Deserialize, Serialize};

use crate::message::{FinishReason, MessageContent, StepMetadata, ToolCall};

/// One observable event of a streamed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StepStreamEvent {
    #[serde(rename = "stream.start")]
    StreamStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<StepMetadata>,
    },

    #[serde(rename = "role")]
    Role { role: String },

    #[serde(rename = "content.delta")]
    ContentDelta { delta: MessageContent },

    #[serde(rename = "reasoning.delta")]
    ReasoningDelta { delta: MessageContent },

    #[serde(rename = "refusal.delta")]
    RefusalDelta { delta: MessageContent },

    #[serde(rename = "tool_call.start")]
    ToolCallStart {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
    },

    #[serde(rename = "tool_call.delta")]
    ToolCallDelta { index: usize, delta: String },

    #[serde(rename = "tool_call.end")]
    ToolCallEnd { index: usize, tool_call: ToolCall },

    #[serde(rename = "stream.end")]
    StreamEnd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
    },

    #[serde(rename = "stream.error")]
    StreamError { error: String },
}

impl StepStreamEvent {
    /// Wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StreamStart { .. } => "stream.start",
            Self::Role { .. } => "role",
            Self::ContentDelta { .. } => "content.delta",
            Self::ReasoningDelta { .. } => "reasoning.delta",
            Self::RefusalDelta { .. } => "refusal.delta",
            Self::ToolCallStart { .. } => "tool_call.start",
            Self::ToolCallDelta { .. } => "tool_call.delta",
            Self::ToolCallEnd { .. } => "tool_call.end",
            Self::StreamEnd { .. } => "stream.end",
            Self::StreamError { .. } => "stream.error",
        }
    }

    /// Describe a failed stream as a `stream.error` event.
    ///
    /// Decoders never emit this; failures terminate the stream with `Err`.
    /// Consumers relaying events over their own wire use it to forward one.
    pub fn error(error: &impl std::fmt::Display) -> Self {
        Self::StreamError {
            error: error.to_string(),
        }
    }
}

// ABOUTME: Anthropic Claude Messages codec - request encoding with system and
// ABOUTME: turn merging, response decoding, thinking blocks, stream mapping.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{parse_arguments, parse_data_url};
use crate::error::CodecError;
use crate::message::{
    ContentPart, ExtraNamespace, FinishReason, FunctionDefinition, MediaSource, Message,
    MessageContent, MessageDelta, StepMetadata, StepParams, StepResult, TokenUsage, ToolCall,
    ToolCallDelta, role,
};
use crate::step::ProviderCodec;
use crate::stream::{ChunkMapper, StepStreamEvent, StepStreamState, StreamSummary};

const PROVIDER: &str = "claude";

/// Default Claude model.
pub const CLAUDE_DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default output token cap; the Messages API requires one.
pub const CLAUDE_DEFAULT_MAX_TOKENS: u32 = 8192;

/// A thinking block kept for replay on a later turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeThinkingBlock {
    Thinking { thinking: String, signature: String },
    RedactedThinking { data: String },
}

/// Claude data stored in a message's extra bag under `"claude"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaudeExtra {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking_blocks: Vec<ClaudeThinkingBlock>,
}

impl ExtraNamespace for ClaudeExtra {
    const KEY: &'static str = "claude";
}

/// Claude API request format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ClaudeMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ClaudeTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_config: Option<ClaudeOutputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
}

/// Claude message format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: ClaudeContent,
}

/// Message content: a bare string or content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

impl ClaudeContent {
    fn into_blocks(self) -> Vec<ClaudeContentBlock> {
        match self {
            Self::Text(text) => vec![ClaudeContentBlock::Text { text }],
            Self::Blocks(blocks) => blocks,
        }
    }
}

/// Claude content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ClaudeSource,
    },
    Document {
        source: ClaudeSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: ClaudeContent,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    RedactedThinking {
        data: String,
    },
    /// Server tool blocks and other kinds this codec does not model.
    #[serde(other)]
    Unknown,
}

/// Source of an image or document block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
    File { file_id: String },
}

/// Claude tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeOutputConfig {
    pub format: ClaudeOutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeOutputFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub schema: serde_json::Value,
}

/// Claude API response format.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

/// Claude usage stats.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

impl From<ClaudeUsage> for TokenUsage {
    fn from(usage: ClaudeUsage) -> Self {
        TokenUsage {
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            cache_read_tokens: usage.cache_read_input_tokens,
            ..Default::default()
        }
    }
}

/// Claude raw stream event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeStreamEvent {
    MessageStart {
        message: ClaudeStreamMessage,
    },
    ContentBlockStart {
        index: usize,
        content_block: ClaudeContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: ClaudeBlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: ClaudeMessageDeltaBody,
        #[serde(default)]
        usage: Option<ClaudeUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ClaudeErrorDetail,
    },
    /// Event kinds added to the protocol after this codec.
    #[serde(other)]
    Unknown,
}

/// The message envelope carried by `message_start`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeStreamMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub usage: Option<ClaudeUsage>,
}

/// Delta payload of `content_block_delta`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeBlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaudeMessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Claude API error response.
#[derive(Debug, Deserialize)]
pub struct ClaudeError {
    pub error: ClaudeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: String,
    pub message: String,
}

/// Codec for the Claude Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeCodec {
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl Default for ClaudeCodec {
    fn default() -> Self {
        Self::new(CLAUDE_DEFAULT_MODEL)
    }
}

impl ClaudeCodec {
    /// Create a codec for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: CLAUDE_DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Set the output token cap.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// The configured model.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// True for roles folded into the top-level system prompt.
pub fn is_claude_system_role(role_name: &str) -> bool {
    matches!(role_name, role::SYSTEM | role::DEVELOPER)
}

/// Map a Claude stop reason onto the shared vocabulary.
pub fn claude_finish_reason(stop_reason: &str) -> FinishReason {
    match stop_reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl From<&FunctionDefinition> for ClaudeTool {
    fn from(function: &FunctionDefinition) -> Self {
        ClaudeTool {
            name: function.name.clone(),
            description: function.description.clone(),
            input_schema: function.parameters.clone(),
        }
    }
}

fn media_source(
    kind: &'static str,
    source: &MediaSource,
    default_type: &str,
) -> Result<ClaudeSource, CodecError> {
    if let (Some(file_id), "file") = (&source.file_id, kind) {
        return Ok(ClaudeSource::File {
            file_id: file_id.clone(),
        });
    }
    if let Some(url) = &source.url {
        return Ok(match parse_data_url(url) {
            Some((media_type, data)) => ClaudeSource::Base64 {
                media_type: media_type.to_string(),
                data: data.to_string(),
            },
            None => ClaudeSource::Url { url: url.clone() },
        });
    }
    if let Some(data) = &source.data {
        let (prefix, default_format) = default_type.split_once('/').unwrap_or((default_type, ""));
        return Ok(ClaudeSource::Base64 {
            media_type: format!(
                "{}/{}",
                prefix,
                source.format.as_deref().unwrap_or(default_format)
            ),
            data: data.clone(),
        });
    }
    Err(CodecError::MissingSource { kind })
}

fn encode_part(part: &ContentPart) -> Result<ClaudeContentBlock, CodecError> {
    match part {
        ContentPart::Text { text } => Ok(ClaudeContentBlock::Text { text: text.clone() }),
        ContentPart::Image(source) => Ok(ClaudeContentBlock::Image {
            source: media_source("image", source, "image/png")?,
        }),
        ContentPart::File(source) => Ok(ClaudeContentBlock::Document {
            source: media_source("file", source, "application/pdf")?,
            title: source.name.clone(),
        }),
        ContentPart::Audio(_) => Err(CodecError::Unsupported {
            provider: PROVIDER,
            kind: part.kind().to_string(),
        }),
    }
}

fn encode_content(content: &MessageContent) -> Result<Vec<ClaudeContentBlock>, CodecError> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Ok(Vec::new()),
        MessageContent::Text(text) => Ok(vec![ClaudeContentBlock::Text { text: text.clone() }]),
        MessageContent::Parts(parts) => parts.iter().map(encode_part).collect(),
    }
}

fn encode_tool_result_content(content: &MessageContent) -> Result<ClaudeContent, CodecError> {
    match content {
        MessageContent::Parts(parts) if parts.iter().any(|p| p.as_text().is_none()) => {
            Ok(ClaudeContent::Blocks(encode_content(content)?))
        }
        _ => Ok(ClaudeContent::Text(content.to_text())),
    }
}

fn thinking_blocks(message: &Message) -> Result<Vec<ClaudeContentBlock>, CodecError> {
    let extra = message.extra_ns::<ClaudeExtra>()?.unwrap_or_default();
    Ok(extra
        .thinking_blocks
        .into_iter()
        .map(|block| match block {
            ClaudeThinkingBlock::Thinking {
                thinking,
                signature,
            } => ClaudeContentBlock::Thinking {
                thinking,
                signature,
            },
            ClaudeThinkingBlock::RedactedThinking { data } => {
                ClaudeContentBlock::RedactedThinking { data }
            }
        })
        .collect())
}

fn tool_use_blocks(calls: &[ToolCall]) -> impl Iterator<Item = ClaudeContentBlock> + '_ {
    calls.iter().map(|call| ClaudeContentBlock::ToolUse {
        id: call.id.clone().unwrap_or_default(),
        name: call.name.clone(),
        input: parse_arguments(PROVIDER, &call.name, &call.arguments),
    })
}

/// Append blocks to the last turn if it has `turn_role`, else start a new turn.
fn push_turn(turns: &mut Vec<ClaudeMessage>, turn_role: &str, blocks: Vec<ClaudeContentBlock>) {
    if let Some(last) = turns.last_mut().filter(|last| last.role == turn_role) {
        let content = std::mem::replace(&mut last.content, ClaudeContent::Blocks(Vec::new()));
        let mut merged = content.into_blocks();
        merged.extend(blocks);
        last.content = ClaudeContent::Blocks(merged);
        return;
    }

    let content = match <[ClaudeContentBlock; 1]>::try_from(blocks) {
        Ok([ClaudeContentBlock::Text { text }]) => ClaudeContent::Text(text),
        Ok([block]) => ClaudeContent::Blocks(vec![block]),
        Err(blocks) => ClaudeContent::Blocks(blocks),
    };
    turns.push(ClaudeMessage {
        role: turn_role.to_string(),
        content,
    });
}

/// Split canonical messages into the system prompt and API turns.
fn encode_messages(messages: &[Message]) -> Result<(Vec<String>, Vec<ClaudeMessage>), CodecError> {
    let mut system = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        if is_claude_system_role(&message.role) {
            let text = message.content.to_text();
            if !text.is_empty() {
                system.push(text);
            }
            continue;
        }

        if message.role == role::TOOL {
            let block = ClaudeContentBlock::ToolResult {
                tool_use_id: message
                    .call_id
                    .clone()
                    .or_else(|| message.id.clone())
                    .unwrap_or_default(),
                content: encode_tool_result_content(&message.content)?,
            };
            push_turn(&mut turns, role::USER, vec![block]);
            continue;
        }

        let turn_role = if message.role == role::ASSISTANT {
            role::ASSISTANT
        } else {
            role::USER
        };

        let mut blocks = Vec::new();
        if turn_role == role::ASSISTANT {
            blocks.extend(thinking_blocks(message)?);
        }
        blocks.extend(encode_content(&message.content)?);
        blocks.extend(tool_use_blocks(message.tool_calls()));

        push_turn(&mut turns, turn_role, blocks);
    }

    Ok((system, turns))
}

/// Decode a finished Claude message into a canonical assistant message.
pub fn decode_claude_content(blocks: Vec<ClaudeContentBlock>) -> Result<Message, CodecError> {
    let mut message = Message::assistant("");
    let mut reasoning = Vec::new();
    let mut saved = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ClaudeContentBlock::Text { text } => message.content.concat_into(text),
            ClaudeContentBlock::Thinking {
                thinking,
                signature,
            } => {
                reasoning.push(thinking.clone());
                saved.push(ClaudeThinkingBlock::Thinking {
                    thinking,
                    signature,
                });
            }
            ClaudeContentBlock::RedactedThinking { data } => {
                saved.push(ClaudeThinkingBlock::RedactedThinking { data });
            }
            ClaudeContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(id, name, serde_json::to_string(&input)?));
            }
            other => debug!(block = ?other, "Skipping unsupported Claude content block"),
        }
    }

    let reasoning = reasoning.join("\n");
    if !reasoning.is_empty() {
        message.reasoning = Some(reasoning.into());
    }
    if !tool_calls.is_empty() {
        message.tool_calls = Some(tool_calls);
    }
    if !saved.is_empty() {
        message.update_extra_ns::<ClaudeExtra, _>(|extra| extra.thinking_blocks = saved)?;
    }

    Ok(message)
}

fn metadata(id: String, model: String) -> Option<StepMetadata> {
    let metadata = StepMetadata {
        id: (!id.is_empty()).then_some(id),
        model: (!model.is_empty()).then_some(model),
    };
    (!metadata.is_empty()).then_some(metadata)
}

impl ProviderCodec for ClaudeCodec {
    type Request = ClaudeRequest;
    type Response = ClaudeResponse;
    type Chunk = ClaudeStreamEvent;
    type Mapper = ClaudeStreamMapper;

    const PROVIDER: &'static str = PROVIDER;

    fn encode(&self, params: &StepParams) -> Result<ClaudeRequest, CodecError> {
        let (system, messages) = encode_messages(&params.messages)?;

        Ok(ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            tools: params.functions().iter().map(ClaudeTool::from).collect(),
            output_config: params.response_schema.as_ref().map(|s| ClaudeOutputConfig {
                format: ClaudeOutputFormat {
                    format_type: "json_schema".to_string(),
                    schema: s.schema.clone(),
                },
            }),
            temperature: self.temperature,
            stream: false,
        })
    }

    fn decode(&self, response: ClaudeResponse) -> Result<StepResult, CodecError> {
        Ok(StepResult {
            messages: vec![decode_claude_content(response.content)?],
            token_usage: response.usage.map(TokenUsage::from),
            finish_reason: response.stop_reason.as_deref().map(claude_finish_reason),
            metadata: metadata(response.id, response.model),
        })
    }

    fn stream_mapper(&self) -> ClaudeStreamMapper {
        ClaudeStreamMapper::default()
    }

    fn set_streaming(&self, request: &mut ClaudeRequest, stream: bool) {
        request.stream = stream;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    ToolUse { tool_index: usize },
    Other,
}

/// Maps Claude raw stream events onto the delta engine.
///
/// Thinking signatures have no delta field; they are buffered per block and
/// written to the `"claude"` extra namespace when the block stops, or when
/// the stream ends if it never does.
#[derive(Debug, Default)]
pub struct ClaudeStreamMapper {
    summary: StreamSummary,
    blocks: HashMap<usize, BlockKind>,
    pending_thinking: Option<(String, String)>,
    thinking_count: usize,
    tool_count: usize,
    tools_with_input: HashSet<usize>,
}

impl ClaudeStreamMapper {
    fn save_thinking(
        state: &mut StepStreamState,
        block: ClaudeThinkingBlock,
    ) -> Result<(), CodecError> {
        state
            .message_mut()
            .update_extra_ns::<ClaudeExtra, _>(|extra| extra.thinking_blocks.push(block))?;
        Ok(())
    }

    fn flush_thinking(&mut self, state: &mut StepStreamState) -> Result<(), CodecError> {
        if let Some((thinking, signature)) = self.pending_thinking.take() {
            Self::save_thinking(
                state,
                ClaudeThinkingBlock::Thinking {
                    thinking,
                    signature,
                },
            )?;
        }
        Ok(())
    }

    fn merge_usage(&mut self, usage: ClaudeUsage) {
        let total = self.summary.token_usage.get_or_insert_with(TokenUsage::default);
        if let Some(input) = usage.input_tokens {
            total.input_tokens = input;
        }
        if let Some(output) = usage.output_tokens {
            total.output_tokens = output;
        }
        if usage.cache_read_input_tokens.is_some() {
            total.cache_read_tokens = usage.cache_read_input_tokens;
        }
    }

    fn block_start(
        &mut self,
        state: &mut StepStreamState,
        index: usize,
        block: ClaudeContentBlock,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        match block {
            ClaudeContentBlock::Text { text } => {
                self.blocks.insert(index, BlockKind::Text);
                Ok(state.apply_delta(MessageDelta::content(text)))
            }
            ClaudeContentBlock::Thinking {
                thinking,
                signature,
            } => {
                self.blocks.insert(index, BlockKind::Thinking);
                let separator = if self.thinking_count > 0 { "\n" } else { "" };
                self.thinking_count += 1;
                self.pending_thinking = Some((thinking.clone(), signature));
                let fragment = format!("{}{}", separator, thinking);
                Ok(state.apply_delta(MessageDelta::reasoning(fragment)))
            }
            ClaudeContentBlock::RedactedThinking { data } => {
                self.blocks.insert(index, BlockKind::Other);
                Self::save_thinking(state, ClaudeThinkingBlock::RedactedThinking { data })?;
                Ok(Vec::new())
            }
            ClaudeContentBlock::ToolUse { id, name, .. } => {
                let tool_index = self.tool_count;
                self.tool_count += 1;
                self.blocks.insert(index, BlockKind::ToolUse { tool_index });
                Ok(state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
                    index: tool_index,
                    id: Some(id),
                    name: Some(name),
                    ..Default::default()
                })))
            }
            other => {
                debug!(block = ?other, "Skipping unsupported Claude stream block");
                self.blocks.insert(index, BlockKind::Other);
                Ok(Vec::new())
            }
        }
    }

    fn block_delta(
        &mut self,
        state: &mut StepStreamState,
        index: usize,
        delta: ClaudeBlockDelta,
    ) -> Vec<StepStreamEvent> {
        match delta {
            ClaudeBlockDelta::TextDelta { text } => state.apply_delta(MessageDelta::content(text)),
            ClaudeBlockDelta::ThinkingDelta { thinking } => {
                if let Some((buffer, _)) = &mut self.pending_thinking {
                    buffer.push_str(&thinking);
                }
                state.apply_delta(MessageDelta::reasoning(thinking))
            }
            ClaudeBlockDelta::SignatureDelta { signature } => {
                if let Some((_, buffer)) = &mut self.pending_thinking {
                    buffer.push_str(&signature);
                }
                Vec::new()
            }
            ClaudeBlockDelta::InputJsonDelta { partial_json } => {
                let Some(BlockKind::ToolUse { tool_index }) = self.blocks.get(&index).copied()
                else {
                    return Vec::new();
                };
                if !partial_json.is_empty() {
                    self.tools_with_input.insert(tool_index);
                }
                state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
                    index: tool_index,
                    arguments: Some(partial_json),
                    ..Default::default()
                }))
            }
            ClaudeBlockDelta::Unknown => Vec::new(),
        }
    }

    fn block_stop(
        &mut self,
        state: &mut StepStreamState,
        index: usize,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        match self.blocks.get(&index).copied() {
            Some(BlockKind::Thinking) => {
                self.flush_thinking(state)?;
                Ok(Vec::new())
            }
            // A tool without input still decodes to `{}`, as in the full response.
            Some(BlockKind::ToolUse { tool_index })
                if !self.tools_with_input.contains(&tool_index) =>
            {
                Ok(state.apply_delta(MessageDelta::tool_call(ToolCallDelta {
                    index: tool_index,
                    arguments: Some("{}".to_string()),
                    ..Default::default()
                })))
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl ChunkMapper for ClaudeStreamMapper {
    type Chunk = ClaudeStreamEvent;

    fn map_chunk(
        &mut self,
        state: &mut StepStreamState,
        event: ClaudeStreamEvent,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        match event {
            ClaudeStreamEvent::MessageStart { message } => {
                self.summary.metadata = metadata(message.id, message.model);
                if let Some(usage) = message.usage {
                    self.merge_usage(usage);
                }
                Ok(message
                    .role
                    .map(|r| state.apply_delta(MessageDelta::role(r)))
                    .unwrap_or_default())
            }
            ClaudeStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => self.block_start(state, index, content_block),
            ClaudeStreamEvent::ContentBlockDelta { index, delta } => {
                Ok(self.block_delta(state, index, delta))
            }
            ClaudeStreamEvent::ContentBlockStop { index } => self.block_stop(state, index),
            ClaudeStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.summary.finish_reason = Some(claude_finish_reason(&reason));
                }
                if let Some(usage) = usage {
                    self.merge_usage(usage);
                }
                Ok(Vec::new())
            }
            ClaudeStreamEvent::MessageStop
            | ClaudeStreamEvent::Ping
            | ClaudeStreamEvent::Unknown => Ok(Vec::new()),
            ClaudeStreamEvent::Error { error } => Err(CodecError::Provider {
                provider: PROVIDER,
                message: format!("{}: {}", error.error_type, error.message),
            }),
        }
    }

    /// A thinking block cut off before its `content_block_stop` is still kept.
    fn finish(&mut self, state: &mut StepStreamState) -> Result<Vec<StepStreamEvent>, CodecError> {
        if self.pending_thinking.is_some() {
            debug!("Flushing unterminated Claude thinking block");
        }
        self.flush_thinking(state)?;
        Ok(Vec::new())
    }

    fn summary(&self) -> &StreamSummary {
        &self.summary
    }
}

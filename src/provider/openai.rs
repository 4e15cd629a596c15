// ABOUTME: OpenAI Chat Completions codec - request encoding, response decoding,
// ABOUTME: and the stream chunk mapper.

use serde::{Deserialize, Serialize};

use super::{data_url, require_text_tool_result};
use crate::error::CodecError;
use crate::message::{
    ContentPart, FunctionDefinition, MediaSource, Message, MessageContent, MessageDelta,
    ResponseSchema, StepMetadata, StepParams, StepResult, TokenUsage, ToolCall, ToolCallDelta,
    role,
};
use crate::step::ProviderCodec;
use crate::stream::{ChunkMapper, StepStreamEvent, StepStreamState, StreamSummary};

const PROVIDER: &str = "openai";

/// Default chat model.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI API request format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OpenAITool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<OpenAIResponseFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAIStreamOptions>,
}

/// OpenAI message format, shared by requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
    /// Reasoning text returned by reasoning-capable compatible servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message content: a string or typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

/// OpenAI content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    Refusal { refusal: String },
    ImageUrl { image_url: OpenAIImageUrl },
    InputAudio { input_audio: OpenAIInputAudio },
    File { file: OpenAIFile },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIInputAudio {
    pub data: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
}

/// OpenAI tool call, either a function call or a custom tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIToolCall {
    Function {
        id: String,
        function: OpenAIFunctionCall,
    },
    Custom {
        id: String,
        custom: OpenAICustomCall,
    },
}

/// OpenAI function call details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// OpenAI custom tool call details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAICustomCall {
    pub name: String,
    pub input: String,
}

/// OpenAI tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAITool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OpenAIFunction,
}

/// OpenAI function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Structured output request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: OpenAIJsonSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIJsonSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIStreamOptions {
    pub include_usage: bool,
}

/// OpenAI API response format.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

/// OpenAI response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI usage stats.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub prompt_tokens_details: Option<OpenAIPromptTokensDetails>,
    #[serde(default)]
    pub completion_tokens_details: Option<OpenAICompletionTokensDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIPromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAICompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
}

/// OpenAI streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

/// OpenAI streaming choice.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIStreamChoice {
    #[serde(default)]
    pub delta: OpenAIStreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI streaming delta.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIStreamDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

/// OpenAI streaming tool call fragment.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAIFunctionDelta>,
}

/// OpenAI streaming function fragment.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
pub struct OpenAIError {
    pub error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIErrorDetail {
    pub message: String,
}

/// Codec for the OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct OpenAICodec {
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
}

impl Default for OpenAICodec {
    fn default() -> Self {
        Self::new(OPENAI_DEFAULT_MODEL)
    }
}

impl OpenAICodec {
    /// Create a codec for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Cap the number of generated tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
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

impl From<&FunctionDefinition> for OpenAITool {
    fn from(function: &FunctionDefinition) -> Self {
        OpenAITool {
            tool_type: "function".to_string(),
            function: OpenAIFunction {
                name: function.name.clone(),
                description: function.description.clone(),
                parameters: function.parameters.clone(),
            },
        }
    }
}

impl From<&ResponseSchema> for OpenAIResponseFormat {
    fn from(schema: &ResponseSchema) -> Self {
        OpenAIResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: OpenAIJsonSchema {
                name: schema.name.clone(),
                schema: schema.schema.clone(),
            },
        }
    }
}

impl From<&ToolCall> for OpenAIToolCall {
    fn from(call: &ToolCall) -> Self {
        OpenAIToolCall::Function {
            id: call.id.clone().unwrap_or_default(),
            function: OpenAIFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

impl From<OpenAIToolCall> for ToolCall {
    fn from(call: OpenAIToolCall) -> Self {
        match call {
            OpenAIToolCall::Function { id, function } => {
                ToolCall::new(id, function.name, function.arguments)
            }
            OpenAIToolCall::Custom { id, custom } => ToolCall::new(id, custom.name, custom.input),
        }
    }
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(usage: OpenAIUsage) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cache_read_tokens: usage.prompt_tokens_details.and_then(|d| d.cached_tokens),
            reasoning_tokens: usage.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        }
    }
}

fn encode_part(part: &ContentPart) -> Result<OpenAIContentPart, CodecError> {
    match part {
        ContentPart::Text { text } => Ok(OpenAIContentPart::Text { text: text.clone() }),
        ContentPart::Image(source) => {
            let url = match (&source.url, &source.data) {
                (Some(url), _) => url.clone(),
                (None, Some(data)) => data_url("image", source.format.as_deref(), "png", data),
                (None, None) => return Err(CodecError::MissingSource { kind: "image" }),
            };
            Ok(OpenAIContentPart::ImageUrl {
                image_url: OpenAIImageUrl { url },
            })
        }
        ContentPart::Audio(source) => {
            let Some(data) = &source.data else {
                if source.url.is_some() {
                    return Err(CodecError::InvalidContent {
                        provider: PROVIDER,
                        message: "audio content requires inline data".to_string(),
                    });
                }
                return Err(CodecError::MissingSource { kind: "audio" });
            };
            Ok(OpenAIContentPart::InputAudio {
                input_audio: OpenAIInputAudio {
                    data: data.clone(),
                    format: source.format.clone().unwrap_or_else(|| "wav".to_string()),
                },
            })
        }
        ContentPart::File(source) => {
            if source.data.is_none() && source.file_id.is_none() {
                if source.url.is_some() {
                    return Err(CodecError::InvalidContent {
                        provider: PROVIDER,
                        message: "file content requires inline data or a file id".to_string(),
                    });
                }
                return Err(CodecError::MissingSource { kind: "file" });
            }
            Ok(OpenAIContentPart::File {
                file: OpenAIFile {
                    file_id: source.file_id.clone(),
                    filename: source.name.clone(),
                    file_data: source.data.clone(),
                },
            })
        }
    }
}

fn encode_content(content: &MessageContent) -> Result<OpenAIContent, CodecError> {
    match content {
        MessageContent::Text(text) => Ok(OpenAIContent::Text(text.clone())),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(encode_part)
            .collect::<Result<Vec<_>, _>>()
            .map(OpenAIContent::Parts),
    }
}

fn encode_message(message: &Message) -> Result<OpenAIMessage, CodecError> {
    if message.role == role::TOOL {
        require_text_tool_result(PROVIDER, &message.content)?;
        return Ok(OpenAIMessage {
            role: role::TOOL.to_string(),
            content: Some(OpenAIContent::Text(message.content.to_text())),
            tool_call_id: Some(
                message
                    .call_id
                    .clone()
                    .or_else(|| message.id.clone())
                    .unwrap_or_default(),
            ),
            ..Default::default()
        });
    }

    let tool_calls = match message.tool_calls() {
        [] => None,
        calls => Some(calls.iter().map(OpenAIToolCall::from).collect()),
    };

    Ok(OpenAIMessage {
        role: message.role.clone(),
        content: Some(encode_content(&message.content)?),
        name: message.name.clone(),
        refusal: message.refusal.as_ref().map(MessageContent::to_text),
        tool_calls,
        ..Default::default()
    })
}

fn decode_part(part: OpenAIContentPart) -> ContentPart {
    match part {
        OpenAIContentPart::Text { text } => ContentPart::Text { text },
        OpenAIContentPart::Refusal { refusal } => ContentPart::Text { text: refusal },
        OpenAIContentPart::ImageUrl { image_url } => ContentPart::image_url(image_url.url),
        OpenAIContentPart::InputAudio { input_audio } => ContentPart::Audio(MediaSource::data(
            input_audio.data,
            Some(input_audio.format),
        )),
        OpenAIContentPart::File { file } => ContentPart::File(MediaSource {
            data: file.file_data,
            file_id: file.file_id,
            name: file.filename,
            ..Default::default()
        }),
    }
}

fn decode_content(content: Option<OpenAIContent>) -> MessageContent {
    match content {
        None => MessageContent::default(),
        Some(OpenAIContent::Text(text)) => MessageContent::Text(text),
        Some(OpenAIContent::Parts(parts)) => match <[OpenAIContentPart; 1]>::try_from(parts) {
            Ok([OpenAIContentPart::Text { text }]) => MessageContent::Text(text),
            Ok([part]) => MessageContent::Parts(vec![decode_part(part)]),
            Err(parts) => MessageContent::Parts(parts.into_iter().map(decode_part).collect()),
        },
    }
}

/// Decode one OpenAI message into a canonical message.
pub fn decode_openai_message(message: OpenAIMessage) -> Message {
    let tool_calls = message
        .tool_calls
        .filter(|calls| !calls.is_empty())
        .map(|calls| calls.into_iter().map(ToolCall::from).collect());

    Message {
        role: message.role,
        name: message.name,
        content: decode_content(message.content),
        reasoning: message.reasoning_content.map(MessageContent::from),
        refusal: message.refusal.map(MessageContent::from),
        tool_calls,
        ..Default::default()
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn metadata(id: String, model: String) -> Option<StepMetadata> {
    let metadata = StepMetadata {
        id: non_empty(id),
        model: non_empty(model),
    };
    (!metadata.is_empty()).then_some(metadata)
}

impl ProviderCodec for OpenAICodec {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;
    type Chunk = OpenAIStreamChunk;
    type Mapper = OpenAIStreamMapper;

    const PROVIDER: &'static str = PROVIDER;

    fn encode(&self, params: &StepParams) -> Result<OpenAIRequest, CodecError> {
        let messages = params
            .messages
            .iter()
            .map(encode_message)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools: params.functions().iter().map(OpenAITool::from).collect(),
            response_format: params.response_schema.as_ref().map(OpenAIResponseFormat::from),
            max_completion_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
            stream_options: None,
        })
    }

    fn decode(&self, response: OpenAIResponse) -> Result<StepResult, CodecError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(CodecError::MissingField {
                provider: PROVIDER,
                field: "choices",
            })?;

        Ok(StepResult {
            messages: vec![decode_openai_message(choice.message)],
            token_usage: response.usage.map(TokenUsage::from),
            finish_reason: choice.finish_reason.map(Into::into),
            metadata: metadata(response.id, response.model),
        })
    }

    fn stream_mapper(&self) -> OpenAIStreamMapper {
        OpenAIStreamMapper::default()
    }

    fn set_streaming(&self, request: &mut OpenAIRequest, stream: bool) {
        request.stream = stream;
        request.stream_options = stream.then_some(OpenAIStreamOptions {
            include_usage: true,
        });
    }
}

/// Maps OpenAI stream chunks onto the delta engine.
#[derive(Debug, Default)]
pub struct OpenAIStreamMapper {
    summary: StreamSummary,
}

impl ChunkMapper for OpenAIStreamMapper {
    type Chunk = OpenAIStreamChunk;

    fn map_chunk(
        &mut self,
        state: &mut StepStreamState,
        chunk: OpenAIStreamChunk,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        if self.summary.metadata.is_none() {
            self.summary.metadata = metadata(chunk.id, chunk.model);
        }
        if let Some(usage) = chunk.usage {
            self.summary.token_usage = Some(usage.into());
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(reason) = choice.finish_reason {
            self.summary.finish_reason = Some(reason.into());
        }

        let delta = choice.delta;
        let tool_calls = delta.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = tc
                        .function
                        .map(|f| (f.name, f.arguments))
                        .unwrap_or_default();
                    ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                        ..Default::default()
                    }
                })
                .collect()
        });

        Ok(state.apply_delta(MessageDelta {
            role: delta.role,
            content: delta.content.map(MessageContent::from),
            reasoning: delta.reasoning_content.map(MessageContent::from),
            refusal: delta.refusal.map(MessageContent::from),
            tool_calls,
        }))
    }

    fn summary(&self) -> &StreamSummary {
        &self.summary
    }
}

// ABOUTME: Google Gemini GenerateContent codec - request encoding with system
// ABOUTME: instructions and thought signatures, response decoding, stream mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{parse_arguments, parse_data_url, require_text_tool_result};
use crate::error::CodecError;
use crate::message::{
    ContentPart, ExtraNamespace, FinishReason, FunctionDefinition, MediaSource, Message,
    MessageContent, MessageDelta, StepMetadata, StepParams, StepResult, TokenUsage, ToolCall,
    ToolCallDelta, role,
};
use crate::step::ProviderCodec;
use crate::stream::{ChunkMapper, StepStreamEvent, StepStreamState, StreamSummary};

const PROVIDER: &str = "gemini";

/// Default Gemini model.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Gemini data stored in a message's extra bag under `"gemini"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiExtra {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thought_signatures: Vec<String>,
}

impl ExtraNamespace for GeminiExtra {
    const KEY: &'static str = "gemini";
}

/// Gemini API request format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Model name; part of the endpoint URL, not the body.
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<GeminiTool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<GeminiSafetySetting>,
}

/// Gemini content (message).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Gemini content part. Exactly one data field is set per part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<GeminiFileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Inline base64 data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBlob {
    pub mime_type: String,
    pub data: String,
}

/// Reference to uploaded or remote data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_uri: String,
}

/// Gemini function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Gemini function response (tool result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

/// Gemini generation config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<serde_json::Value>,
}

impl GeminiGenerationConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Gemini tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// Gemini function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One safety filter threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiSafetySetting {
    pub category: String,
    pub threshold: String,
}

impl GeminiSafetySetting {
    /// Create a setting for one harm category.
    pub fn new(category: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            threshold: threshold.into(),
        }
    }

    /// Disable blocking for every adjustable harm category.
    pub fn permissive() -> Vec<Self> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
            "HARM_CATEGORY_CIVIC_INTEGRITY",
        ]
        .into_iter()
        .map(|category| Self::new(category, "BLOCK_NONE"))
        .collect()
    }
}

/// Gemini API response format; also the shape of each stream chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

/// Gemini response candidate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Why a prompt was rejected before generation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Gemini usage metadata.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: Option<u64>,
    #[serde(default)]
    pub cached_content_token_count: Option<u64>,
    #[serde(default)]
    pub thoughts_token_count: Option<u64>,
}

impl From<GeminiUsageMetadata> for TokenUsage {
    fn from(usage: GeminiUsageMetadata) -> Self {
        TokenUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
            cache_read_tokens: usage.cached_content_token_count,
            reasoning_tokens: usage.thoughts_token_count,
        }
    }
}

/// Gemini API error response.
#[derive(Debug, Deserialize)]
pub struct GeminiError {
    pub error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorDetail {
    #[serde(default)]
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub status: String,
}

/// Codec for the Gemini GenerateContent API.
#[derive(Debug, Clone)]
pub struct GeminiCodec {
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    safety_settings: Vec<GeminiSafetySetting>,
}

impl Default for GeminiCodec {
    fn default() -> Self {
        Self::new(GEMINI_DEFAULT_MODEL)
    }
}

impl GeminiCodec {
    /// Create a codec for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
            safety_settings: Vec::new(),
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

    /// Set safety filter thresholds.
    pub fn safety_settings(mut self, settings: Vec<GeminiSafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }

    /// The configured model.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// True for roles folded into the system instruction when leading.
pub fn is_gemini_system_role(role_name: &str) -> bool {
    matches!(role_name, role::SYSTEM | role::DEVELOPER)
}

/// Map a Gemini finish reason onto the shared vocabulary.
pub fn gemini_finish_reason(finish_reason: &str) -> FinishReason {
    match finish_reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Stop,
    }
}

impl From<&FunctionDefinition> for GeminiFunctionDeclaration {
    fn from(function: &FunctionDefinition) -> Self {
        GeminiFunctionDeclaration {
            name: function.name.clone(),
            description: function.description.clone(),
            parameters: function.parameters.clone(),
        }
    }
}

fn media_part(kind: &'static str, source: &MediaSource) -> Result<GeminiPart, CodecError> {
    let mime_type = source.format.as_ref().map(|format| {
        if format.contains('/') {
            format.clone()
        } else {
            let prefix = if kind == "file" { "application" } else { kind };
            format!("{}/{}", prefix, format)
        }
    });

    if let Some(url) = &source.url {
        return Ok(match parse_data_url(url) {
            Some((mime_type, data)) => GeminiPart {
                inline_data: Some(GeminiBlob {
                    mime_type: mime_type.to_string(),
                    data: data.to_string(),
                }),
                ..Default::default()
            },
            None => GeminiPart {
                file_data: Some(GeminiFileData {
                    mime_type,
                    file_uri: url.clone(),
                }),
                ..Default::default()
            },
        });
    }
    if let Some(data) = &source.data {
        let Some(mime_type) = mime_type else {
            return Err(CodecError::InvalidContent {
                provider: PROVIDER,
                message: format!("inline {} data requires a format", kind),
            });
        };
        return Ok(GeminiPart {
            inline_data: Some(GeminiBlob {
                mime_type,
                data: data.clone(),
            }),
            ..Default::default()
        });
    }
    if let Some(file_id) = &source.file_id {
        return Ok(GeminiPart {
            file_data: Some(GeminiFileData {
                mime_type,
                file_uri: file_id.clone(),
            }),
            ..Default::default()
        });
    }
    Err(CodecError::MissingSource { kind })
}

fn encode_part(part: &ContentPart) -> Result<GeminiPart, CodecError> {
    match part {
        ContentPart::Text { text } => Ok(GeminiPart::text(text.clone())),
        ContentPart::Image(source) => media_part("image", source),
        ContentPart::Audio(source) => media_part("audio", source),
        ContentPart::File(source) => media_part("file", source),
    }
}

fn encode_turn(message: &Message) -> Result<Vec<GeminiPart>, CodecError> {
    let mut parts = match &message.content {
        MessageContent::Text(text) if text.is_empty() && !message.tool_calls().is_empty() => {
            Vec::new()
        }
        MessageContent::Text(text) => vec![GeminiPart::text(text.clone())],
        MessageContent::Parts(content) => content
            .iter()
            .map(encode_part)
            .collect::<Result<Vec<_>, _>>()?,
    };

    for call in message.tool_calls() {
        parts.push(GeminiPart {
            function_call: Some(GeminiFunctionCall {
                id: call.id.clone(),
                name: call.name.clone(),
                args: parse_arguments(PROVIDER, &call.name, &call.arguments),
            }),
            ..Default::default()
        });
    }

    let signature = message
        .extra_ns::<GeminiExtra>()?
        .and_then(|extra| extra.thought_signatures.into_iter().next());
    if let Some(signature) = signature {
        match parts.iter_mut().find(|p| p.function_call.is_some()) {
            Some(part) => part.thought_signature = Some(signature),
            None => {
                for part in parts.iter_mut().filter(|p| p.text.is_some()) {
                    part.thought_signature = Some(signature.clone());
                }
            }
        }
    }

    Ok(parts)
}

fn encode_tool_result(
    message: &Message,
    call_names: &HashMap<String, String>,
) -> Result<GeminiPart, CodecError> {
    require_text_tool_result(PROVIDER, &message.content)?;

    let call_id = message.call_id.clone().or_else(|| message.id.clone());
    let name = call_id
        .as_ref()
        .and_then(|id| call_names.get(id))
        .or(message.name.as_ref())
        .cloned()
        .ok_or_else(|| CodecError::InvalidContent {
            provider: PROVIDER,
            message: format!(
                "tool result '{}' does not match any earlier tool call",
                call_id.as_deref().unwrap_or_default()
            ),
        })?;

    Ok(GeminiPart {
        function_response: Some(GeminiFunctionResponse {
            id: call_id,
            name,
            response: serde_json::json!({ "result": message.content.to_text() }),
        }),
        ..Default::default()
    })
}

fn encode_contents(
    messages: &[Message],
) -> Result<(Option<GeminiContent>, Vec<GeminiContent>), CodecError> {
    let leading = messages
        .iter()
        .take_while(|m| is_gemini_system_role(&m.role))
        .count();
    let (system, rest) = messages.split_at(leading);

    let system_parts: Vec<GeminiPart> = system
        .iter()
        .flat_map(|m| m.content.text_segments())
        .filter(|text| !text.is_empty())
        .map(GeminiPart::text)
        .collect();
    let system_instruction = (!system_parts.is_empty()).then_some(GeminiContent {
        role: None,
        parts: system_parts,
    });

    let mut call_names = HashMap::new();
    let mut contents: Vec<GeminiContent> = Vec::new();

    for message in rest {
        if message.role == role::TOOL {
            let part = encode_tool_result(message, &call_names)?;
            let merge = contents.last_mut().filter(|last| {
                last.role.as_deref() == Some(role::USER)
                    && last.parts.iter().all(|p| p.function_response.is_some())
            });
            match merge {
                Some(last) => last.parts.push(part),
                None => contents.push(GeminiContent {
                    role: Some(role::USER.to_string()),
                    parts: vec![part],
                }),
            }
            continue;
        }

        for call in message.tool_calls() {
            if let Some(id) = &call.id {
                call_names.insert(id.clone(), call.name.clone());
            }
        }

        let turn_role = if message.role == role::ASSISTANT {
            "model"
        } else {
            role::USER
        };
        contents.push(GeminiContent {
            role: Some(turn_role.to_string()),
            parts: encode_turn(message)?,
        });
    }

    Ok((system_instruction, contents))
}

fn decode_blob(blob: GeminiBlob) -> Option<ContentPart> {
    let url = format!("data:{};base64,{}", blob.mime_type, blob.data);
    let kind = blob.mime_type.split('/').next().unwrap_or_default();
    match kind {
        "image" => Some(ContentPart::image_url(url)),
        "audio" => Some(ContentPart::Audio(MediaSource::url(url))),
        _ => {
            debug!(mime_type = %blob.mime_type, "Skipping unsupported Gemini inline data");
            None
        }
    }
}

/// Canonical pieces of one Gemini content, shared by both decode paths.
#[derive(Debug, Default)]
struct DecodedContent {
    content: MessageContent,
    reasoning: MessageContent,
    calls: Vec<GeminiFunctionCall>,
    signatures: Vec<String>,
}

fn decode_parts(parts: Vec<GeminiPart>) -> DecodedContent {
    let mut decoded = DecodedContent::default();

    for part in parts {
        if let Some(signature) = part.thought_signature {
            decoded.signatures.push(signature);
        }
        if let Some(part) = part.inline_data.and_then(decode_blob) {
            decoded.content.concat_into(part);
        }
        if let Some(call) = part.function_call {
            decoded.calls.push(call);
        }
        let Some(text) = part.text.filter(|t| !t.is_empty()) else {
            continue;
        };
        if part.thought.unwrap_or(false) {
            decoded.reasoning.concat_into(text);
        } else {
            decoded.content.concat_into(text);
        }
    }

    decoded
}

fn call_arguments(call: &GeminiFunctionCall) -> Result<String, CodecError> {
    if call.args.is_null() {
        return Ok("{}".to_string());
    }
    Ok(serde_json::to_string(&call.args)?)
}

/// Decode one Gemini content into a canonical assistant message.
pub fn decode_gemini_content(content: GeminiContent) -> Result<Message, CodecError> {
    let decoded = decode_parts(content.parts);

    let mut message = Message::assistant(decoded.content);
    if !decoded.reasoning.is_empty() {
        message.reasoning = Some(decoded.reasoning);
    }
    if !decoded.calls.is_empty() {
        let calls = decoded
            .calls
            .iter()
            .map(|call| {
                Ok(ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call_arguments(call)?,
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        message.tool_calls = Some(calls);
    }
    if !decoded.signatures.is_empty() {
        message.update_extra_ns::<GeminiExtra, _>(|extra| {
            extra.thought_signatures = decoded.signatures
        })?;
    }

    Ok(message)
}

fn metadata(response: &GeminiResponse) -> Option<StepMetadata> {
    let metadata = StepMetadata {
        id: response.response_id.clone(),
        model: response.model_version.clone(),
    };
    (!metadata.is_empty()).then_some(metadata)
}

impl ProviderCodec for GeminiCodec {
    type Request = GeminiRequest;
    type Response = GeminiResponse;
    type Chunk = GeminiResponse;
    type Mapper = GeminiStreamMapper;

    const PROVIDER: &'static str = PROVIDER;

    fn encode(&self, params: &StepParams) -> Result<GeminiRequest, CodecError> {
        let (system_instruction, contents) = encode_contents(&params.messages)?;

        let mut generation_config = GeminiGenerationConfig {
            max_output_tokens: self.max_tokens,
            temperature: self.temperature,
            ..Default::default()
        };
        if let Some(schema) = &params.response_schema {
            generation_config.response_mime_type = Some("application/json".to_string());
            generation_config.response_json_schema = Some(schema.schema.clone());
        }

        let tools = match params.functions() {
            [] => Vec::new(),
            functions => vec![GeminiTool {
                function_declarations: functions
                    .iter()
                    .map(GeminiFunctionDeclaration::from)
                    .collect(),
            }],
        };

        Ok(GeminiRequest {
            model: self.model.clone(),
            contents,
            system_instruction,
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
            tools,
            safety_settings: self.safety_settings.clone(),
        })
    }

    fn decode(&self, response: GeminiResponse) -> Result<StepResult, CodecError> {
        let metadata = metadata(&response);
        let token_usage = response.usage_metadata.map(TokenUsage::from);

        let Some(candidate) = response.candidates.into_iter().next() else {
            let blocked = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason);
            return match blocked {
                Some(reason) => {
                    debug!(reason = %reason, "Gemini blocked the prompt");
                    Ok(StepResult {
                        messages: vec![Message::assistant("")],
                        token_usage,
                        finish_reason: Some(FinishReason::ContentFilter),
                        metadata,
                    })
                }
                None => Err(CodecError::MissingField {
                    provider: PROVIDER,
                    field: "candidates",
                }),
            };
        };

        Ok(StepResult {
            messages: vec![decode_gemini_content(candidate.content.unwrap_or_default())?],
            token_usage,
            finish_reason: candidate.finish_reason.as_deref().map(gemini_finish_reason),
            metadata,
        })
    }

    fn stream_mapper(&self) -> GeminiStreamMapper {
        GeminiStreamMapper::default()
    }
}

/// Maps Gemini stream chunks onto the delta engine.
///
/// Gemini does not number function calls; each new call takes the next index
/// after those already in the state.
#[derive(Debug, Default)]
pub struct GeminiStreamMapper {
    summary: StreamSummary,
}

impl ChunkMapper for GeminiStreamMapper {
    type Chunk = GeminiResponse;

    fn map_chunk(
        &mut self,
        state: &mut StepStreamState,
        chunk: GeminiResponse,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        if self.summary.metadata.is_none() {
            self.summary.metadata = metadata(&chunk);
        }
        if let Some(usage) = chunk.usage_metadata {
            self.summary.token_usage = Some(usage.into());
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            if chunk
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .is_some()
            {
                self.summary.finish_reason = Some(FinishReason::ContentFilter);
            }
            return Ok(Vec::new());
        };
        if let Some(reason) = candidate.finish_reason.as_deref() {
            self.summary.finish_reason = Some(gemini_finish_reason(reason));
        }
        let Some(content) = candidate.content else {
            return Ok(Vec::new());
        };

        let decoded = decode_parts(content.parts);

        if !decoded.signatures.is_empty() {
            state
                .message_mut()
                .update_extra_ns::<GeminiExtra, _>(|extra| {
                    extra.thought_signatures.extend(decoded.signatures)
                })?;
        }

        let first_index = state.tool_call_count();
        let tool_calls = decoded
            .calls
            .iter()
            .enumerate()
            .map(|(i, call)| {
                Ok(ToolCallDelta {
                    index: first_index + i,
                    id: call.id.clone(),
                    name: Some(call.name.clone()),
                    arguments: Some(call_arguments(call)?),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(state.apply_delta(MessageDelta {
            role: Some(role::ASSISTANT.to_string()),
            content: Some(decoded.content),
            reasoning: Some(decoded.reasoning),
            refusal: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        }))
    }

    fn summary(&self) -> &StreamSummary {
        &self.summary
    }
}

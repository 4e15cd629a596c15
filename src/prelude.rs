// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use stepcodec::prelude::*;` to get started quickly.

pub use crate::error::{CodecError, StepError, TranscriptError, TransportError, ValidationError};
pub use crate::message::{
    ContentPart, FinishReason, FunctionDefinition, MediaSource, Message, MessageContent,
    StepMetadata, StepParams, StepResult, TokenUsage, ToolCall, role,
};
pub use crate::provider::{ClaudeCodec, GeminiCodec, OpenAICodec};
pub use crate::step::{EncoderSource, ProviderCodec, Step, StepOutput};
pub use crate::stream::{StepStream, StepStreamEvent};
pub use crate::transcript::{Transcript, TranscriptFormat, decode_stf, encode_stf};
pub use crate::transport::{ClaudeTransport, GeminiTransport, OpenAITransport, Transport};

// ABOUTME: Root module for stepcodec - a canonical chat message model with
// ABOUTME: request/response and streaming codecs for OpenAI, Claude and Gemini.

pub mod error;
pub mod message;
pub mod prelude;
pub mod provider;
pub mod step;
pub mod stream;
pub mod transcript;
pub mod transport;

pub use error::{CodecError, StepError, TranscriptError, TransportError, ValidationError};
pub use message::{Message, MessageContent, StepParams, StepResult};
pub use step::{EncoderSource, ProviderCodec, Step, StepOutput};
pub use stream::{StepStream, StepStreamEvent};

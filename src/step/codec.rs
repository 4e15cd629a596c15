// ABOUTME: Defines the ProviderCodec trait and the EncoderSource sum type used
// ABOUTME: to plug either a plain encode function or a codec into a Step.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::message::{StepParams, StepResult};
use crate::stream::ChunkMapper;

/// Maps canonical step params and results to one provider's wire format.
pub trait ProviderCodec: Send + Sync + 'static {
    /// Wire request body.
    type Request: Serialize + Send + Sync + 'static;
    /// Wire response body for non-streaming calls.
    type Response: DeserializeOwned + Send + 'static;
    /// One decoded stream chunk.
    type Chunk: DeserializeOwned + Send + 'static;
    /// Per-stream chunk mapper.
    type Mapper: ChunkMapper<Chunk = Self::Chunk>;

    /// Provider name used in errors and logs.
    const PROVIDER: &'static str;

    /// Encode canonical params into a request.
    fn encode(&self, params: &StepParams) -> Result<Self::Request, CodecError>;

    /// Decode a finished response.
    fn decode(&self, response: Self::Response) -> Result<StepResult, CodecError>;

    /// Create a fresh mapper for one streamed response.
    fn stream_mapper(&self) -> Self::Mapper;

    /// Mark an encoded request as streaming or not.
    ///
    /// Providers that select streaming by endpoint leave the body alone.
    fn set_streaming(&self, _request: &mut Self::Request, _stream: bool) {}
}

/// A shared encode function.
pub type EncodeFn<R> = Arc<dyn Fn(&StepParams) -> Result<R, CodecError> + Send + Sync>;

/// Where a step gets its request encoder from.
pub enum EncoderSource<C: ProviderCodec> {
    /// A plain function producing the wire request.
    Plain(EncodeFn<C::Request>),
    /// A codec whose `encode` is used.
    Factory(C),
}

impl<C: ProviderCodec> EncoderSource<C> {
    /// Wrap a closure as a plain encoder.
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(&StepParams) -> Result<C::Request, CodecError> + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    /// Resolve into a single callable.
    pub fn into_encode_fn(self) -> EncodeFn<C::Request> {
        match self {
            Self::Plain(f) => f,
            Self::Factory(codec) => {
                let codec = Arc::new(codec);
                Arc::new(move |params: &StepParams| codec.encode(params))
            }
        }
    }
}

impl<C: ProviderCodec> From<C> for EncoderSource<C> {
    fn from(codec: C) -> Self {
        Self::Factory(codec)
    }
}

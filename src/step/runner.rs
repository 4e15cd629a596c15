// ABOUTME: Step binds a codec, an encoder, and a transport into one callable
// ABOUTME: request/response exchange, streamed or not.

use std::sync::Arc;

use tracing::debug;

use crate::error::StepError;
use crate::message::{StepParams, StepResult};
use crate::stream::{StepStream, decode_stream};
use crate::transport::Transport;

use super::{EncodeFn, EncoderSource, ProviderCodec};

/// Output of [`Step::call`].
pub enum StepOutput {
    Result(StepResult),
    Stream(StepStream),
}

impl StepOutput {
    /// Resolve to the final result, draining the stream if needed.
    pub async fn into_result(self) -> Result<StepResult, StepError> {
        match self {
            Self::Result(result) => Ok(result),
            Self::Stream(stream) => stream.collect_result().await,
        }
    }
}

/// One provider exchange: encode, send, decode.
pub struct Step<C: ProviderCodec, T> {
    codec: Arc<C>,
    encode: EncodeFn<C::Request>,
    transport: T,
}

impl<C, T> Step<C, T>
where
    C: ProviderCodec,
    T: Transport<Request = C::Request, Response = C::Response, Chunk = C::Chunk>,
{
    /// Create a step that encodes with `codec` itself.
    pub fn new(codec: C, transport: T) -> Self {
        let codec = Arc::new(codec);
        let encoder = Arc::clone(&codec);
        Self {
            codec,
            encode: Arc::new(move |params: &StepParams| encoder.encode(params)),
            transport,
        }
    }

    /// Replace the request encoder.
    pub fn with_encoder(mut self, source: impl Into<EncoderSource<C>>) -> Self {
        self.encode = source.into().into_encode_fn();
        self
    }

    /// The codec used for decoding.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn prepare(&self, params: &StepParams, stream: bool) -> Result<C::Request, StepError> {
        let mut request = (self.encode)(params)?;
        self.codec.set_streaming(&mut request, stream);
        debug!(
            provider = C::PROVIDER,
            stream,
            messages = params.messages.len(),
            "Sending step"
        );
        Ok(request)
    }

    /// Run a non-streaming step.
    pub async fn run(&self, params: &StepParams) -> Result<StepResult, StepError> {
        let request = self.prepare(params, false)?;
        let response = self.transport.send(&request).await?;
        Ok(self.codec.decode(response)?)
    }

    /// Run a streaming step. Nothing is decoded until the stream is polled.
    pub async fn stream(&self, params: &StepParams) -> Result<StepStream, StepError> {
        let request = self.prepare(params, true)?;
        let chunks = self.transport.send_stream(&request).await?;
        Ok(decode_stream(self.codec.stream_mapper(), chunks))
    }

    /// Run the step, streamed or not.
    pub async fn call(&self, params: &StepParams, stream: bool) -> Result<StepOutput, StepError> {
        if stream {
            Ok(StepOutput::Stream(self.stream(params).await?))
        } else {
            Ok(StepOutput::Result(self.run(params).await?))
        }
    }
}

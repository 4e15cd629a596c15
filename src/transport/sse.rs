// ABOUTME: Server-sent events framing - splits a response body into data
// ABOUTME: payloads and parses each one into a provider chunk.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use super::ChunkStream;
use crate::error::TransportError;

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// The payload of a `data:` line.
    Payload(String),
    /// The OpenAI-style `[DONE]` terminator.
    Done,
}

/// Buffers raw body bytes and yields complete `data:` lines.
///
/// Bytes are buffered until a newline, so multi-byte characters split across
/// network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return the data of every line they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&String::from_utf8_lossy(&line)) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseData> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&line))
    }
}

fn parse_line(line: &str) -> Option<SseData> {
    let line = line.trim();
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Payload(data.to_string()))
}

/// Parse one payload. A malformed payload ends the stream with an error.
fn parse_payload<C: DeserializeOwned>(
    provider: &'static str,
    payload: &str,
) -> Result<C, TransportError> {
    serde_json::from_str(payload).map_err(|e| {
        warn!(provider, error = %e, "Unparsable SSE payload");
        TransportError::Deserialize(e)
    })
}

/// Turn an SSE response body into a stream of parsed chunks.
///
/// The body is read only as the returned stream is polled; dropping the
/// stream drops the response.
pub fn sse_stream<C>(provider: &'static str, response: reqwest::Response) -> ChunkStream<C>
where
    C: DeserializeOwned + Send + 'static,
{
    sse_chunks(provider, response.bytes_stream())
}

/// Frame and parse any SSE byte stream.
pub fn sse_chunks<C, S, B, E>(provider: &'static str, body: S) -> ChunkStream<C>
where
    C: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send,
    TransportError: From<E>,
{
    Box::pin(try_stream! {
        let mut body = Box::pin(body);
        let mut lines = SseLineBuffer::new();

        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(TransportError::from)?;
            let bytes = bytes.as_ref();
            trace!(provider, len = bytes.len(), "Received SSE bytes");

            for data in lines.push(bytes) {
                match data {
                    SseData::Done => return,
                    SseData::Payload(payload) => {
                        let chunk = parse_payload(provider, &payload)?;
                        yield chunk;
                    }
                }
            }
        }

        if let Some(SseData::Payload(payload)) = lines.finish() {
            let chunk = parse_payload(provider, &payload)?;
            yield chunk;
        }
    })
}

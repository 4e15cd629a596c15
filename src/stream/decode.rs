// ABOUTME: Pull-based stream decoding - drives a provider chunk mapper over a
// ABOUTME: chunk stream and exposes events plus the final StepResult.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::error::{CodecError, StepError, TransportError};
use crate::message::{FinishReason, StepMetadata, StepResult, TokenUsage};

use super::{StepStreamEvent, StepStreamState};

/// Response-level facts a mapper collects alongside the message.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub metadata: Option<StepMetadata>,
    pub token_usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

/// Translates one provider chunk into deltas applied to the shared state.
pub trait ChunkMapper: Send + 'static {
    type Chunk: Send + 'static;

    /// Map a chunk, applying its delta (if any) to `state`.
    fn map_chunk(
        &mut self,
        state: &mut StepStreamState,
        chunk: Self::Chunk,
    ) -> Result<Vec<StepStreamEvent>, CodecError>;

    /// Called once after the last chunk, before the state is finalized.
    fn finish(
        &mut self,
        _state: &mut StepStreamState,
    ) -> Result<Vec<StepStreamEvent>, CodecError> {
        Ok(Vec::new())
    }

    /// Metadata, usage and finish reason seen so far.
    fn summary(&self) -> &StreamSummary;
}

enum StreamItem {
    Event(StepStreamEvent),
    Done(StepResult),
}

type ItemStream = Pin<Box<dyn Stream<Item = Result<StreamItem, StepError>> + Send>>;

/// Decode a provider chunk stream into a [`StepStream`].
///
/// Nothing is read from `chunks` until the returned stream is polled.
pub fn decode_stream<M, S, E>(mut mapper: M, chunks: S) -> StepStream
where
    M: ChunkMapper,
    S: Stream<Item = Result<M::Chunk, E>> + Send + 'static,
    E: Send + 'static,
    StepError: From<E>,
{
    let inner = try_stream! {
        let mut chunks = Box::pin(chunks);
        let mut state = StepStreamState::new();
        let mut started = false;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(StepError::from)?;
            trace!("Mapping stream chunk");
            let events = mapper
                .map_chunk(&mut state, chunk)
                .map_err(StepError::Codec)?;

            if !started {
                started = true;
                debug!("Stream started");
                yield StreamItem::Event(StepStreamEvent::StreamStart {
                    metadata: mapper.summary().metadata.clone(),
                });
            }
            for event in events {
                yield StreamItem::Event(event);
            }
        }

        if !started {
            yield StreamItem::Event(StepStreamEvent::StreamStart { metadata: None });
        }

        for event in mapper.finish(&mut state).map_err(StepError::Codec)? {
            yield StreamItem::Event(event);
        }

        let summary = mapper.summary().clone();
        let (events, message) = state.finalize();
        for event in events {
            yield StreamItem::Event(event);
        }

        debug!(finish_reason = ?summary.finish_reason, "Stream ended");
        yield StreamItem::Event(StepStreamEvent::StreamEnd {
            finish_reason: summary.finish_reason.clone(),
        });
        yield StreamItem::Done(StepResult {
            messages: vec![message],
            token_usage: summary.token_usage,
            finish_reason: summary.finish_reason,
            metadata: summary.metadata,
        });
    };

    StepStream {
        inner: Box::pin(inner),
        result: None,
    }
}

/// A single-pass stream of step events that also yields the final result.
///
/// Items are produced only as the stream is polled. A failure ends the
/// stream with an `Err` item and no result. Dropping the stream drops the
/// underlying chunk stream, releasing the transport's response body.
pub struct StepStream {
    inner: ItemStream,
    result: Option<StepResult>,
}

impl StepStream {
    /// The final result, available once the stream is exhausted.
    pub fn result(&self) -> Option<&StepResult> {
        self.result.as_ref()
    }

    /// Take the final result, if the stream has been exhausted.
    pub fn into_result(self) -> Option<StepResult> {
        self.result
    }

    /// Drain the remaining events and return the final result.
    pub async fn collect_result(mut self) -> Result<StepResult, StepError> {
        while let Some(item) = self.next().await {
            item?;
        }
        self.result
            .ok_or(StepError::Transport(TransportError::StreamClosed))
    }
}

impl Stream for StepStream {
    type Item = Result<StepStreamEvent, StepError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(StreamItem::Event(event)))) => {
                    return Poll::Ready(Some(Ok(event)));
                }
                Poll::Ready(Some(Ok(StreamItem::Done(result)))) => {
                    self.result = Some(result);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::message::{MessageContent, MessageDelta};

    /// Chunk source that counts polls and flags when it is dropped.
    struct TrackedChunks {
        deltas: VecDeque<MessageDelta>,
        polls: Arc<AtomicUsize>,
        dropped: Arc<AtomicBool>,
    }

    impl Stream for TrackedChunks {
        type Item = Result<MessageDelta, TransportError>;

        fn poll_next(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Self::Item>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(self.deltas.pop_front().map(Ok))
        }
    }

    impl Drop for TrackedChunks {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// Chunks are already-normalized deltas.
    #[derive(Default)]
    struct DeltaMapper {
        summary: StreamSummary,
    }

    impl ChunkMapper for DeltaMapper {
        type Chunk = MessageDelta;

        fn map_chunk(
            &mut self,
            state: &mut StepStreamState,
            chunk: MessageDelta,
        ) -> Result<Vec<StepStreamEvent>, CodecError> {
            self.summary.finish_reason = Some(FinishReason::Stop);
            Ok(state.apply_delta(chunk))
        }

        fn summary(&self) -> &StreamSummary {
            &self.summary
        }
    }

    fn chunks(
        deltas: Vec<Result<MessageDelta, TransportError>>,
    ) -> impl Stream<Item = Result<MessageDelta, TransportError>> + Send + 'static {
        futures::stream::iter(deltas)
    }

    #[tokio::test]
    async fn test_events_bracketed_by_start_and_end() {
        let mut stream = decode_stream(
            DeltaMapper::default(),
            chunks(vec![
                Ok(MessageDelta::role("assistant")),
                Ok(MessageDelta::content("Hi")),
            ]),
        );

        let mut kinds = Vec::new();
        while let Some(event) = stream.next().await {
            kinds.push(event.unwrap().event_type());
        }
        assert_eq!(
            kinds,
            vec!["stream.start", "role", "content.delta", "stream.end"]
        );

        let result = stream.result().unwrap();
        assert_eq!(result.text(), "Hi");
        assert_eq!(result.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_empty_chunk_stream_still_completes() {
        let result = decode_stream(DeltaMapper::default(), chunks(vec![]))
            .collect_result()
            .await
            .unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, "assistant");
        assert_eq!(result.messages[0].content, MessageContent::from(""));
    }

    #[tokio::test]
    async fn test_transport_error_terminates_stream() {
        let mut stream = decode_stream(
            DeltaMapper::default(),
            chunks(vec![
                Ok(MessageDelta::content("partial")),
                Err(TransportError::StreamClosed),
                Ok(MessageDelta::content("never seen")),
            ]),
        );

        let mut saw_error = false;
        while let Some(item) = stream.next().await {
            if let Err(e) = item {
                assert!(matches!(e, StepError::Transport(TransportError::StreamClosed)));
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert!(stream.result().is_none());
    }

    #[tokio::test]
    async fn test_collect_result_propagates_error() {
        let err = decode_stream(
            DeltaMapper::default(),
            chunks(vec![Err(TransportError::StreamClosed)]),
        )
        .collect_result()
        .await
        .unwrap_err();
        assert!(matches!(err, StepError::Transport(_)));
    }

    #[tokio::test]
    async fn test_chunks_read_lazily_and_released_on_drop() {
        let polls = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicBool::new(false));
        let source = TrackedChunks {
            deltas: VecDeque::from(vec![
                MessageDelta::content("one"),
                MessageDelta::content("two"),
                MessageDelta::content("three"),
            ]),
            polls: Arc::clone(&polls),
            dropped: Arc::clone(&dropped),
        };

        let mut stream = decode_stream(DeltaMapper::default(), source);
        assert_eq!(polls.load(Ordering::SeqCst), 0);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.event_type(), "stream.start");
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert!(!dropped.load(Ordering::SeqCst));

        drop(stream);
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }
}

// ABOUTME: Provider adapters - OpenAI, Claude, and Gemini codecs plus the
// ABOUTME: small helpers they share for media and tool-call arguments.

mod claude;
mod gemini;
mod openai;

pub use claude::*;
pub use gemini::*;
pub use openai::*;

use tracing::warn;

use crate::error::CodecError;
use crate::message::MessageContent;

/// Build a `data:` URL for inline base64 media.
pub(crate) fn data_url(
    kind: &str,
    format: Option<&str>,
    default_format: &str,
    data: &str,
) -> String {
    format!(
        "data:{}/{};base64,{}",
        kind,
        format.unwrap_or(default_format),
        data
    )
}

/// Split a `data:<mime>;base64,<data>` URL into its media type and payload.
pub(crate) fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (media_type, data) = rest.split_once(";base64,")?;
    Some((media_type, data))
}

/// Reject tool results carrying non-text parts for text-only providers.
pub(crate) fn require_text_tool_result(
    provider: &'static str,
    content: &MessageContent,
) -> Result<(), CodecError> {
    let MessageContent::Parts(parts) = content else {
        return Ok(());
    };
    match parts.iter().find(|p| p.as_text().is_none()) {
        Some(part) => Err(CodecError::Unsupported {
            provider,
            kind: format!("{} tool result", part.kind()),
        }),
        None => Ok(()),
    }
}

/// Parse tool-call arguments for providers that take structured input.
///
/// Arguments that are not valid JSON are replaced by an empty object.
pub(crate) fn parse_arguments(
    provider: &'static str,
    name: &str,
    arguments: &str,
) -> serde_json::Value {
    if arguments.trim().is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                provider,
                tool = name,
                error = %e,
                "Tool call arguments are not valid JSON, sending {{}}"
            );
            serde_json::Value::Object(serde_json::Map::new())
        }
    }
}

#[cfg(test)]
mod claude_test;
#[cfg(test)]
mod openai_test;

/// Run a mapper over ready-made chunks and return the events and result.
#[cfg(test)]
pub(crate) async fn drain_stream<M: crate::stream::ChunkMapper>(
    mapper: M,
    chunks: Vec<M::Chunk>,
) -> (Vec<crate::stream::StepStreamEvent>, crate::message::StepResult) {
    use futures::StreamExt;

    let chunks = chunks
        .into_iter()
        .map(Ok::<_, crate::error::TransportError>);
    let mut stream = crate::stream::decode_stream(mapper, futures::stream::iter(chunks));
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }
    let result = stream.into_result().unwrap();
    (events, result)
}

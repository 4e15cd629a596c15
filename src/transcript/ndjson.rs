// ABOUTME: Newline-delimited JSON transcript codec - one message object per
// ABOUTME: line, with an optional leading `{"metadata": ...}` line.

use serde_json::{Map, Value};
use tracing::debug;

use super::Transcript;
use crate::error::TranscriptError;
use crate::message::{Message, validate_message};

fn metadata_line(object: &Map<String, Value>) -> Option<&Value> {
    match object.len() {
        1 => object.get("metadata"),
        _ => None,
    }
}

/// Decode an ND-JSON transcript. Blank lines are skipped.
pub fn decode_ndjson(source: &str) -> Result<Transcript, TranscriptError> {
    let mut transcript = Transcript::default();
    let mut first = true;

    for (index, line) in source.split('\n').enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|e| {
            TranscriptError::syntax(line_number, format!("Invalid JSON: {}", e))
        })?;
        let Value::Object(object) = value else {
            return Err(TranscriptError::syntax(line_number, "Expected a JSON object"));
        };

        if std::mem::take(&mut first) {
            if let Some(metadata) = metadata_line(&object) {
                transcript.metadata = Some(metadata.clone()).filter(|m| !m.is_null());
                continue;
            }
        }

        let message = validate_message(Value::Object(object), &format!("line {}", line_number))?;
        transcript.messages.push(message);
    }

    debug!(
        messages = transcript.messages.len(),
        "Decoded ND-JSON transcript"
    );
    Ok(transcript)
}

/// Encode messages one per line, preceded by a metadata line when given.
pub fn encode_ndjson(
    messages: &[Message],
    metadata: Option<&Value>,
) -> Result<String, TranscriptError> {
    let mut lines = Vec::with_capacity(messages.len() + 1);
    if let Some(metadata) = metadata {
        let mut header = Map::new();
        header.insert("metadata".to_string(), metadata.clone());
        lines.push(Value::Object(header).to_string());
    }
    for message in messages {
        lines.push(serde_json::to_string(message)?);
    }
    Ok(lines.join("\n"))
}

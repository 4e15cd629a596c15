// ABOUTME: TOML transcript codec - a document with a `[[messages]]` array of
// ABOUTME: tables and an optional `[metadata]` table.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::Transcript;
use super::json::transcript_from_value;
use crate::error::TranscriptError;
use crate::message::Message;

#[derive(Serialize)]
struct TomlTranscript<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
    messages: &'a [Message],
}

/// Decode a TOML transcript.
///
/// The document is read as a `{messages, metadata}` object, with the same
/// validation as the JSON codec.
pub fn decode_toml(source: &str) -> Result<Transcript, TranscriptError> {
    let value: Value = toml::from_str(source)?;
    let transcript = transcript_from_value(value)?;
    debug!(
        messages = transcript.messages.len(),
        "Decoded TOML transcript"
    );
    Ok(transcript)
}

/// Encode messages, and metadata when given, as a TOML document.
pub fn encode_toml(
    messages: &[Message],
    metadata: Option<&Value>,
) -> Result<String, TranscriptError> {
    Ok(toml::to_string(&TomlTranscript { metadata, messages })?)
}

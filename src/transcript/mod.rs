// ABOUTME: Persisted transcript formats - STF for hand-written conversations,
// ABOUTME: plus JSON, ND-JSON and TOML for machine round-trips.

mod args;
mod decoder;
mod encoder;
mod json;
mod ndjson;
mod toml;


pub use args::{CommandArgs, parse_command_args};
pub use decoder::decode_stf;
pub use encoder::{StfEncoder, encode_stf};
pub use json::{decode_json, encode_json};
pub use ndjson::{decode_ndjson, encode_ndjson};
pub use self::toml::{decode_toml, encode_toml};

use serde_json::Value;

use crate::error::TranscriptError;
use crate::message::Message;

/// A decoded conversation with optional free-form metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub messages: Vec<Message>,
    pub metadata: Option<Value>,
}

impl Transcript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The on-disk transcript formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptFormat {
    Stf,
    Json,
    NdJson,
    Toml,
}

impl TranscriptFormat {
    /// Pick a format from a file extension, without the leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "stf" => Some(Self::Stf),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::NdJson),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn decode(self, source: &str) -> Result<Transcript, TranscriptError> {
        match self {
            Self::Stf => Ok(Transcript::new(decode_stf(source)?)),
            Self::Json => decode_json(source),
            Self::NdJson => decode_ndjson(source),
            Self::Toml => decode_toml(source),
        }
    }

    /// Encode a transcript. STF has no metadata slot, so metadata is dropped.
    pub fn encode(self, transcript: &Transcript) -> Result<String, TranscriptError> {
        let metadata = transcript.metadata.as_ref();
        match self {
            Self::Stf => {
                if metadata.is_some() {
                    tracing::debug!("Dropping transcript metadata for STF output");
                }
                encode_stf(&transcript.messages)
            }
            Self::Json => encode_json(&transcript.messages, metadata),
            Self::NdJson => encode_ndjson(&transcript.messages, metadata),
            Self::Toml => encode_toml(&transcript.messages, metadata),
        }
    }
}

/// Parse a block body, preferring strict JSON so integers keep their type.
fn parse_json5_value(text: &str) -> Result<Value, json5::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) => json5::from_str(text),
    }
}

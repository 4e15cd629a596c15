// ABOUTME: STF encoder - renders messages as role commands with plain text
// ABOUTME: bodies, falling back to `;raw` JSON for anything richer.

use std::fmt::Write as _;

use tracing::debug;

use crate::error::TranscriptError;
use crate::message::{Message, role};

/// Encoder options for STF output.
#[derive(Debug, Clone)]
pub struct StfEncoder {
    extra: bool,
}

impl Default for StfEncoder {
    fn default() -> Self {
        Self { extra: true }
    }
}

impl StfEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `extra` side channels are written. Defaults to true.
    pub fn extra(mut self, include: bool) -> Self {
        self.extra = include;
        self
    }

    /// Encode messages; decoding the result yields the same messages.
    pub fn encode(&self, messages: &[Message]) -> Result<String, TranscriptError> {
        let rendered = messages
            .iter()
            .map(|m| self.encode_message(m))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(messages = messages.len(), "Encoded STF transcript");
        Ok(rendered.join("\n"))
    }

    fn encode_message(&self, message: &Message) -> Result<String, TranscriptError> {
        if needs_raw(message) {
            let json = if self.extra || message.extra.is_none() {
                serde_json::to_string_pretty(message)?
            } else {
                serde_json::to_string_pretty(&Message {
                    extra: None,
                    ..message.clone()
                })?
            };
            return Ok(format!(";raw\n{}\n;end", escape_lines(&json)));
        }

        let mut out = match role_command(&message.role) {
            Some(command) => format!(";{}", command),
            None => format!(";msg role={}", quote_value(&message.role)),
        };
        for (key, value) in [
            ("name", &message.name),
            ("id", &message.id),
            ("call_id", &message.call_id),
        ] {
            if let Some(value) = value {
                let _ = write!(out, " {}={}", key, quote_value(value));
            }
        }

        if let Some(text) = message.content.as_str().filter(|t| !t.is_empty()) {
            out.push('\n');
            out.push_str(&escape_lines(text));
        }

        if let Some(extra) = message.extra.as_ref().filter(|_| self.extra) {
            let json = serde_json::to_string_pretty(extra)?;
            let _ = write!(out, "\n;extra\n{}\n;end", escape_lines(&json));
        }
        Ok(out)
    }
}

/// Encode messages as STF with default options.
pub fn encode_stf(messages: &[Message]) -> Result<String, TranscriptError> {
    StfEncoder::new().encode(messages)
}

/// Messages whose fields cannot be expressed as a command plus text body.
fn needs_raw(message: &Message) -> bool {
    message.content.is_parts()
        || message.reasoning.is_some()
        || message.refusal.is_some()
        || message.tool_calls.is_some()
}

fn role_command(message_role: &str) -> Option<&'static str> {
    match message_role {
        role::SYSTEM => Some("sys"),
        role::DEVELOPER => Some("dev"),
        role::USER => Some("user"),
        role::ASSISTANT => Some("ai"),
        role::TOOL => Some("tool"),
        _ => None,
    }
}

/// Leave simple values bare; quote anything the argument scanner would split.
fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c == ' ' || c == '\t' || c == '"' || c == '\'' || c.is_control());
    if needs_quotes {
        serde_json::Value::String(value.to_string()).to_string()
    } else {
        value.to_string()
    }
}

/// Prefix lines that start with `;` so they decode as data.
fn escape_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with(';') {
                format!(";{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_value() {
        assert_eq!(quote_value("user"), "user");
        assert_eq!(quote_value(""), "\"\"");
        assert_eq!(quote_value("John Doe"), "\"John Doe\"");
        assert_eq!(quote_value("it's"), "\"it's\"");
        assert_eq!(quote_value("a\nb"), "\"a\\nb\"");
    }

    #[test]
    fn test_escape_lines() {
        assert_eq!(escape_lines("a\n;b\n;;c"), "a\n;;b\n;;;c");
    }
}

// ABOUTME: JSON transcript codec - a message array, or an object holding
// ABOUTME: `messages` plus optional `metadata`.

use serde_json::{Value, json};
use tracing::debug;

use super::Transcript;
use crate::error::{TranscriptError, ValidationError};
use crate::message::{Message, validate_message, validate_messages};

/// Decode a JSON transcript.
///
/// Accepts a message array, `{"messages": [...], "metadata": ...}`, or a
/// single message object.
pub fn decode_json(source: &str) -> Result<Transcript, TranscriptError> {
    let value: Value = serde_json::from_str(source)?;
    let transcript = transcript_from_value(value)?;
    debug!(
        messages = transcript.messages.len(),
        "Decoded JSON transcript"
    );
    Ok(transcript)
}

pub(super) fn transcript_from_value(value: Value) -> Result<Transcript, ValidationError> {
    match value {
        Value::Array(_) => Ok(Transcript::new(validate_messages(value)?)),
        Value::Object(mut object) => match object.remove("messages") {
            Some(messages) => Ok(Transcript {
                messages: validate_messages(messages)?,
                metadata: object.remove("metadata").filter(|m| !m.is_null()),
            }),
            None => Ok(Transcript::new(vec![validate_message(
                Value::Object(object),
                "$",
            )?])),
        },
        _ => Err(ValidationError::single(
            "$",
            "expected a message, an array of messages, or an object with messages",
        )),
    }
}

/// Encode messages as a JSON array, or as `{metadata, messages}` when
/// metadata is given.
pub fn encode_json(
    messages: &[Message],
    metadata: Option<&Value>,
) -> Result<String, TranscriptError> {
    let encoded = match metadata {
        Some(metadata) => serde_json::to_string(&json!({
            "metadata": metadata,
            "messages": messages,
        }))?,
        None => serde_json::to_string(messages)?,
    };
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_array() {
        let source = r#"[{"role":"user","content":"Hi"},{"role":"assistant","content":"Hello"}]"#;
        let transcript = decode_json(source).unwrap();
        assert_eq!(
            transcript.messages,
            vec![Message::user("Hi"), Message::assistant("Hello")]
        );
        assert!(transcript.metadata.is_none());
    }

    #[test]
    fn test_decode_object_with_metadata() {
        let transcript = decode_json(
            r#"{"metadata":{"title":"demo"},"messages":[{"role":"user","content":"Hi"}]}"#,
        )
        .unwrap();
        assert_eq!(transcript.messages, vec![Message::user("Hi")]);
        assert_eq!(transcript.metadata, Some(json!({"title": "demo"})));
    }

    #[test]
    fn test_decode_single_message() {
        let transcript = decode_json(r#"{"role":"system","content":"Be brief"}"#).unwrap();
        assert_eq!(transcript.messages, vec![Message::system("Be brief")]);
    }

    #[test]
    fn test_decode_reports_failing_paths() {
        let err = decode_json(r#"[{"role":"user"},{"content":"no role"},{"role":1}]"#).unwrap_err();
        let TranscriptError::Validation(err) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(err.paths().len(), 2);
        assert!(err.paths().iter().all(|p| !p.starts_with("$[0]")));
    }

    #[test]
    fn test_decode_rejects_scalars() {
        assert!(matches!(
            decode_json("42"),
            Err(TranscriptError::Validation(_))
        ));
        assert!(matches!(decode_json("[1,"), Err(TranscriptError::Json(_))));
    }

    #[test]
    fn test_encode_shapes() {
        let messages = vec![Message::user("Hi")];
        assert_eq!(
            encode_json(&messages, None).unwrap(),
            r#"[{"role":"user","content":"Hi"}]"#
        );

        let encoded = encode_json(&messages, Some(&json!({"title": "demo"}))).unwrap();
        let decoded = decode_json(&encoded).unwrap();
        assert_eq!(decoded.messages, messages);
        assert_eq!(decoded.metadata, Some(json!({"title": "demo"})));
    }
}

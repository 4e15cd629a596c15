// ABOUTME: Validates untyped JSON into canonical messages, reporting every
// ABOUTME: failing path instead of stopping at the first bad message.

use crate::error::{ValidationError, ValidationIssue};

use super::Message;

/// Validate a single message value; `path` prefixes reported issues.
pub fn validate_message(value: serde_json::Value, path: &str) -> Result<Message, ValidationError> {
    let mut issues = Vec::new();
    let message = check_message(value, path, &mut issues);
    match message {
        Some(m) if issues.is_empty() => Ok(m),
        _ => Err(ValidationError { issues }),
    }
}

/// Validate a JSON array of messages.
pub fn validate_messages(value: serde_json::Value) -> Result<Vec<Message>, ValidationError> {
    let serde_json::Value::Array(items) = value else {
        return Err(ValidationError::single("$", "expected an array of messages"));
    };

    let mut issues = Vec::new();
    let mut messages = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if let Some(m) = check_message(item, &format!("$[{}]", i), &mut issues) {
            messages.push(m);
        }
    }

    if issues.is_empty() {
        Ok(messages)
    } else {
        Err(ValidationError { issues })
    }
}

fn check_message(
    value: serde_json::Value,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Message> {
    if !value.is_object() {
        issues.push(ValidationIssue {
            path: path.to_string(),
            message: "expected a message object".to_string(),
        });
        return None;
    }

    match serde_json::from_value::<Message>(value) {
        Ok(m) if m.role.is_empty() => {
            issues.push(ValidationIssue {
                path: format!("{}.role", path),
                message: "role must not be empty".to_string(),
            });
            None
        }
        Ok(m) => Some(m),
        Err(e) => {
            issues.push(ValidationIssue {
                path: path.to_string(),
                message: e.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_messages() {
        let messages = validate_messages(json!([
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": [{"type": "text", "text": "Hello"}]},
        ]))
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content.to_text(), "Hello");
    }

    #[test]
    fn test_missing_content_defaults_to_empty() {
        let messages = validate_messages(json!([{"role": "user"}])).unwrap();
        assert!(messages[0].content.is_empty());
    }

    #[test]
    fn test_reports_every_failing_path() {
        let err = validate_messages(json!([
            {"role": "user", "content": "ok"},
            {"content": "no role"},
            "not an object",
            {"role": "", "content": "empty role"},
        ]))
        .unwrap_err();

        assert_eq!(err.paths(), vec!["$[1]", "$[2]", "$[3].role"]);
    }

    #[test]
    fn test_non_array_rejected() {
        let err = validate_messages(json!({"role": "user"})).unwrap_err();
        assert_eq!(err.paths(), vec!["$"]);
    }
}

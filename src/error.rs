// ABOUTME: Defines all error types for the stepcodec library using thiserror.
// ABOUTME: Each concern has its own error enum, unified under StepError.

use std::fmt;

/// Top-level error type for the stepcodec library.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),
}

/// Errors from mapping between canonical messages and provider wire formats.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{provider} does not support {kind} content")]
    Unsupported { provider: &'static str, kind: String },

    #[error("{kind} content part must have url or data")]
    MissingSource { kind: &'static str },

    #[error("Invalid {provider} content: {message}")]
    InvalidContent {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} response is missing required field '{field}'")]
    MissingField {
        provider: &'static str,
        field: &'static str,
    },

    #[error("{provider} reported an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the network layer that carries provider requests.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream closed unexpectedly")]
    StreamClosed,

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(#[source] anyhow::Error),
}

/// Errors from the persisted transcript formats (STF, JSON, ND-JSON).
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Invalid message data: {0}")]
    Validation(#[from] ValidationError),
}

impl TranscriptError {
    /// Build a syntax error for a 1-based line number.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// A single failing location found while validating message data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

/// Structured validation failure listing every failing path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Create a validation error with a single issue.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                path: path.into(),
                message: message.into(),
            }],
        }
    }

    /// Paths of all failing locations.
    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| format!("{}: {}", i.path, i.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

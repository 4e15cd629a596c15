// ABOUTME: Message content model - plain text or an ordered list of typed parts,
// ABOUTME: plus the concatenation algebra used by decoders and the stream engine.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Location and encoding of a binary content part (image, audio, file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64-encoded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MediaSource {
    /// A source pointing at a URL (including `data:` URLs).
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// A source carrying inline base64 data.
    pub fn data(data: impl Into<String>, format: Option<String>) -> Self {
        Self {
            data: Some(data.into()),
            format,
            ..Default::default()
        }
    }

    /// True when neither a URL nor inline data is present.
    pub fn is_unresolved(&self) -> bool {
        self.url.is_none() && self.data.is_none()
    }
}

/// A typed part of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(MediaSource),
    Audio(MediaSource),
    File(MediaSource),
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part referencing a URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image(MediaSource::url(url))
    }

    /// Create an image part from raw bytes; `format` is the subtype, e.g. `png`.
    pub fn image_bytes(bytes: &[u8], format: impl Into<String>) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::Image(MediaSource::data(data, Some(format.into())))
    }

    /// Name of the part variant, as used in its `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
            Self::File(_) => "file",
        }
    }

    /// The text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Content of a message: either a plain string or a list of parts.
///
/// Once a value has become a part list, appending to it with
/// [`concat_into`](Self::concat_into) never turns it back into a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

impl From<ContentPart> for MessageContent {
    fn from(part: ContentPart) -> Self {
        Self::Parts(vec![part])
    }
}

/// Zero or one text part; an empty string yields no part at all.
fn text_to_parts(text: String) -> Vec<ContentPart> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentPart::Text { text }]
    }
}

impl MessageContent {
    /// True for an empty string or an empty part list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Parts(p) => p.is_empty(),
        }
    }

    /// True if this is a part list.
    pub fn is_parts(&self) -> bool {
        matches!(self, Self::Parts(_))
    }

    /// The string value, if this content is a plain string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Parts(_) => None,
        }
    }

    /// Concatenated text of all text parts; non-text parts contribute nothing.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect(),
        }
    }

    /// One entry per text part, or the whole string.
    pub fn text_segments(&self) -> Vec<&str> {
        match self {
            Self::Text(s) => vec![s.as_str()],
            Self::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect(),
        }
    }

    /// Iterate over the parts, treating a non-empty string as one text part.
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            Self::Text(s) => text_to_parts(s),
            Self::Parts(p) => p,
        }
    }

    /// Concatenate contents in order.
    ///
    /// Leading string operands are joined into one string. If nothing else
    /// follows, that string is the result. Otherwise it becomes a single
    /// text part (none if empty) and every later operand is flattened into
    /// parts in argument order, the same way repeated `concat_into` would.
    pub fn concat<I>(contents: I) -> MessageContent
    where
        I: IntoIterator<Item = MessageContent>,
    {
        let mut contents = contents.into_iter().peekable();

        let mut lead = String::new();
        while let Some(Self::Text(s)) = contents.next_if(|c| !c.is_parts()) {
            lead.push_str(&s);
        }
        if contents.peek().is_none() {
            return Self::Text(lead);
        }

        let mut parts = text_to_parts(lead);
        parts.extend(contents.flat_map(Self::into_parts));
        Self::Parts(parts)
    }

    /// Append `other` onto `self` in place.
    ///
    /// An existing part list is extended without reallocating its parts.
    /// Appending empty content is a no-op.
    pub fn concat_into(&mut self, other: impl Into<MessageContent>) {
        let other = other.into();
        if other.is_empty() {
            return;
        }

        match (&mut *self, other) {
            (Self::Text(target), Self::Text(s)) => target.push_str(&s),
            (Self::Text(target), Self::Parts(parts)) => {
                let mut merged = text_to_parts(std::mem::take(target));
                merged.extend(parts);
                *self = Self::Parts(merged);
            }
            (Self::Parts(target), Self::Text(s)) => target.push(ContentPart::Text { text: s }),
            (Self::Parts(target), Self::Parts(parts)) => target.extend(parts),
        }
    }
}

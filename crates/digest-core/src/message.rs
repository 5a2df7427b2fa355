use serde::Deserialize;

/// Prefix the chat platform renders for an unresolved @-mention.
pub const MENTION_PLACEHOLDER: &str = "@_user_";

/// Message type discriminator as far as the digest cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Other(String),
}

impl MessageKind {
    pub fn from_type(msg_type: &str) -> Self {
        match msg_type {
            "text" => MessageKind::Text,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

/// One feed item, reduced to what the collector needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub create_time_ms: i64,
    pub kind: MessageKind,
    /// Decoded text. `None` for non-text kinds or undecodable payloads.
    pub text: Option<String>,
}

impl RawMessage {
    /// Build from the feed's type tag and its JSON-encoded `content` payload.
    pub fn from_payload(create_time_ms: i64, msg_type: &str, content: Option<&str>) -> Self {
        let kind = MessageKind::from_type(msg_type);
        let text = match kind {
            MessageKind::Text => content.and_then(decode_text_content),
            MessageKind::Other(_) => None,
        };
        Self {
            create_time_ms,
            kind,
            text,
        }
    }

    pub fn text(create_time_ms: i64, text: impl Into<String>) -> Self {
        Self {
            create_time_ms,
            kind: MessageKind::Text,
            text: Some(text.into()),
        }
    }

    /// Cleaned text if this message belongs in a digest.
    ///
    /// Returns `None` for non-text kinds, undecodable payloads, blank text, and text
    /// starting with a mention placeholder.
    pub fn digest_text(&self) -> Option<&str> {
        if self.kind != MessageKind::Text {
            return None;
        }
        let text = self.text.as_deref()?.trim();
        if text.is_empty() || text.starts_with(MENTION_PLACEHOLDER) {
            return None;
        }
        Some(text)
    }
}

#[derive(Deserialize)]
struct TextContent {
    text: String,
}

/// Decode a text message payload, e.g. `{"text":"hello"}`.
pub fn decode_text_content(content: &str) -> Option<String> {
    serde_json::from_str::<TextContent>(content)
        .ok()
        .map(|c| c.text)
}

/// Message texts of one day, earliest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    texts: Vec<String>,
}

impl MessageBatch {
    pub fn new(texts: Vec<String>) -> Self {
        Self { texts }
    }

    /// Build from texts gathered in feed order (newest first).
    pub fn from_newest_first(mut texts: Vec<String>) -> Self {
        texts.reverse();
        Self { texts }
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Newline-joined text, the form both the prompt and the raw column use.
    pub fn joined(&self) -> String {
        self.texts.join("\n")
    }
}

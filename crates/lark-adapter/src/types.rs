use digest_core::RawMessage;
use serde::{Deserialize, Serialize};

/// Standard `{code, msg, data}` envelope of the open platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Body of the tenant access token exchange.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub app_id: &'a str,
    pub app_secret: &'a str,
}

/// The token endpoint answers without a `data` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub tenant_access_token: Option<String>,
    /// Seconds until expiry.
    #[serde(default)]
    pub expire: i64,
}

/// `data` of a message list page.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageListData {
    #[serde(default)]
    pub items: Vec<MessageItem>,
    #[serde(default)]
    pub has_more: bool,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageItem {
    #[serde(default)]
    pub message_id: String,
    pub msg_type: String,
    /// Epoch milliseconds, as a decimal string.
    pub create_time: String,
    #[serde(default)]
    pub deleted: bool,
    pub body: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    /// JSON-encoded payload; for text messages `{"text": "..."}`.
    pub content: String,
}

impl MessageItem {
    /// Convert to the collector's message. `None` when `create_time` is not a number.
    pub fn to_raw_message(&self) -> Option<RawMessage> {
        let create_time_ms = self.create_time.trim().parse::<i64>().ok()?;
        if self.deleted {
            return Some(RawMessage::from_payload(create_time_ms, "deleted", None));
        }
        Some(RawMessage::from_payload(
            create_time_ms,
            &self.msg_type,
            self.body.as_ref().map(|b| b.content.as_str()),
        ))
    }
}

/// Body of a create-record request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRecordRequest {
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// `data` of a create-record response.
///
/// The v1 API nests the id under `record`; some gateways flatten it.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordData {
    pub record: Option<RecordRef>,
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordRef {
    pub record_id: Option<String>,
}

impl CreateRecordData {
    pub fn record_id(&self) -> Option<&str> {
        self.record
            .as_ref()
            .and_then(|r| r.record_id.as_deref())
            .or(self.record_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// `data` of a chat list page.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatListData {
    #[serde(default)]
    pub items: Vec<ChatSummary>,
    #[serde(default)]
    pub has_more: bool,
    pub page_token: Option<String>,
}

/// A group chat the application belongs to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Continuation cursor of a page, if the platform says there is more.
pub(crate) fn next_cursor(has_more: bool, page_token: Option<String>) -> Option<String> {
    if !has_more {
        return None;
    }
    page_token.filter(|t| !t.is_empty())
}

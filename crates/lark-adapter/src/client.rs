use crate::types::{
    next_cursor, ApiEnvelope, ChatListData, ChatSummary, CreateRecordData, CreateRecordRequest,
    MessageListData, TokenRequest, TokenResponse,
};
use async_trait::async_trait;
use digest_core::{
    AccessToken, ChatFeed, DigestError, FeedPage, FeedQuery, FieldNames, RecordSink, Result,
    TableRecord, TokenProvider,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";
const CHATS_PATH: &str = "/open-apis/im/v1/chats";

/// Connection settings for the open platform.
#[derive(Clone)]
pub struct LarkConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Per-request timeout, also bounding connect.
    pub timeout: Duration,
}

impl fmt::Debug for LarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LarkConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LarkConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Open platform client: token exchange, message feed, chat listing.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct LarkClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
}

impl LarkClient {
    pub fn new(config: LarkConfig) -> Result<Self> {
        let http = build_http(config.timeout)?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id,
            app_secret: config.app_secret,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every group chat the application has joined.
    pub async fn list_chats(&self, token: &AccessToken) -> Result<Vec<ChatSummary>> {
        let mut chats = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url(CHATS_PATH))
                .header(reqwest::header::AUTHORIZATION, token.bearer())
                .query(&[("page_size", "100")]);
            if let Some(pt) = &page_token {
                request = request.query(&[("page_token", pt.as_str())]);
            }

            let (status, body) = send(request).await.map_err(|e| {
                DigestError::fetch(format!("chat list request failed: {}", e), None)
            })?;
            let data: ChatListData = open_envelope(status, body, "chat list", DigestError::fetch)?;
            chats.extend(data.items);

            match next_cursor(data.has_more, data.page_token) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(chats)
    }
}

#[async_trait]
impl TokenProvider for LarkClient {
    async fn fetch_token(&self) -> Result<AccessToken> {
        let request = self.http.post(self.url(TOKEN_PATH)).json(&TokenRequest {
            app_id: &self.app_id,
            app_secret: &self.app_secret,
        });
        let (status, body) = send(request)
            .await
            .map_err(|e| DigestError::auth(format!("token request failed: {}", e), None))?;

        if !status.is_success() {
            return Err(DigestError::auth(format!("token endpoint returned HTTP {}", status), Some(body)));
        }
        let parsed: TokenResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(DigestError::auth(format!("unreadable token response: {}", e), Some(body)))
            }
        };
        if parsed.code != 0 {
            return Err(DigestError::auth(
                format!("token exchange failed with code {}: {}", parsed.code, parsed.msg),
                Some(body),
            ));
        }
        match parsed.tenant_access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::debug!(expires_in = parsed.expire, "Tenant access token acquired");
                Ok(AccessToken::new(token))
            }
            None => Err(DigestError::auth("token response has no tenant_access_token", Some(body))),
        }
    }
}

#[async_trait]
impl ChatFeed for LarkClient {
    async fn list_messages(&self, token: &AccessToken, query: &FeedQuery) -> Result<FeedPage> {
        let mut params: Vec<(&str, String)> = vec![
            ("container_id_type", "chat".to_string()),
            ("container_id", query.chat_id.clone()),
            ("sort_type", "ByCreateTimeDesc".to_string()),
            ("page_size", query.page_size.to_string()),
        ];
        if let Some(pt) = &query.page_token {
            params.push(("page_token", pt.clone()));
        }
        if let Some((start, end)) = query.bounds_secs {
            params.push(("start_time", start.to_string()));
            params.push(("end_time", end.to_string()));
        }

        tracing::debug!(
            chat_id = %query.chat_id,
            page_size = query.page_size,
            has_cursor = query.page_token.is_some(),
            "Listing messages"
        );

        let request = self
            .http
            .get(self.url(MESSAGES_PATH))
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .query(&params);
        let (status, body) = send(request)
            .await
            .map_err(|e| DigestError::fetch(format!("message list request failed: {}", e), None))?;
        let data: MessageListData = open_envelope(status, body, "message list", DigestError::fetch)?;

        let mut messages = Vec::with_capacity(data.items.len());
        for item in &data.items {
            match item.to_raw_message() {
                Some(msg) => messages.push(msg),
                None => tracing::warn!(
                    message_id = %item.message_id,
                    create_time = %item.create_time,
                    "Dropping message with unreadable create_time"
                ),
            }
        }

        Ok(FeedPage {
            messages,
            next_cursor: next_cursor(data.has_more, data.page_token),
        })
    }
}

/// Where daily records go in Bitable.
#[derive(Debug, Clone)]
pub struct TableTarget {
    pub app_token: String,
    pub table_id: String,
    pub fields: FieldNames,
}

/// [`RecordSink`] backed by a Bitable table.
#[derive(Clone)]
pub struct BitableWriter {
    client: LarkClient,
    target: TableTarget,
}

impl BitableWriter {
    pub fn new(client: LarkClient, target: TableTarget) -> Self {
        Self { client, target }
    }

    fn records_url(&self) -> String {
        self.client.url(&format!(
            "/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.target.app_token, self.target.table_id
        ))
    }
}

#[async_trait]
impl RecordSink for BitableWriter {
    async fn append(&self, token: &AccessToken, record: &TableRecord) -> Result<String> {
        let payload = CreateRecordRequest {
            fields: record.to_fields(&self.target.fields),
        };
        let request = self
            .client
            .http
            .post(self.records_url())
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .json(&payload);
        let (status, body) = send(request)
            .await
            .map_err(|e| DigestError::write(format!("record request failed: {}", e), None))?;

        let raw = body.clone();
        let data: CreateRecordData = open_envelope(status, body, "create record", DigestError::write)?;
        match data.record_id() {
            Some(id) => Ok(id.to_string()),
            None => Err(DigestError::write("create record response has no record_id", Some(raw))),
        }
    }
}

/// HTTP client with the same per-request and connect timeout.
pub fn build_http(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| DigestError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Send and read the whole body as text, whatever the status.
async fn send(
    request: reqwest::RequestBuilder,
) -> std::result::Result<(reqwest::StatusCode, String), reqwest::Error> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    Ok((status, body))
}

/// Check status, decode the `{code, msg, data}` envelope, and require `code == 0` and `data`.
/// Every failure carries the raw body.
fn open_envelope<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    body: String,
    what: &str,
    err: fn(String, Option<String>) -> DigestError,
) -> Result<T> {
    if !status.is_success() {
        return Err(err(format!("{} returned HTTP {}", what, status), Some(body)));
    }
    let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => return Err(err(format!("unreadable {} response: {}", what, e), Some(body))),
    };
    if envelope.code != 0 {
        return Err(err(
            format!("{} failed with code {}: {}", what, envelope.code, envelope.msg),
            Some(body),
        ));
    }
    match envelope.data {
        Some(data) => Ok(data),
        None => Err(err(format!("{} response has no data", what), Some(body))),
    }
}

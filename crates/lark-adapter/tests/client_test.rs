use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use digest_core::*;
use lark_adapter::{BitableWriter, LarkClient, LarkConfig, TableTarget};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fake open platform ───────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FakeLark {
    /// Newest-first message items, served two per page.
    items: Arc<Vec<Value>>,
    /// Status and body returned by the records endpoint; default is success.
    record_reply: Option<(u16, Value)>,
    written: Arc<Mutex<Vec<(String, String, Value)>>>,
    message_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

fn ms(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().timestamp_millis()
}

fn text_item(id: &str, rfc3339: &str, text: &str) -> Value {
    json!({
        "message_id": id,
        "msg_type": "text",
        "create_time": ms(rfc3339).to_string(),
        "deleted": false,
        "body": { "content": json!({ "text": text }).to_string() },
    })
}

async fn token(Json(body): Json<Value>) -> Json<Value> {
    if body["app_id"] == "cli_test" && body["app_secret"] == "secret" {
        Json(json!({ "code": 0, "msg": "ok", "tenant_access_token": "t-fake", "expire": 7200 }))
    } else {
        Json(json!({ "code": 10014, "msg": "app secret invalid" }))
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer t-fake")
}

async fn messages(
    State(lark): State<FakeLark>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": 99991663, "msg": "invalid access token" })),
        );
    }
    lark.message_queries.lock().unwrap().push(params.clone());

    let size: usize = params["page_size"].parse().unwrap();
    let offset: usize = params
        .get("page_token")
        .map(|t| t.trim_start_matches("pt_").parse().unwrap())
        .unwrap_or(0);
    let end = (offset + size).min(lark.items.len());
    let has_more = end < lark.items.len();
    let page_token = if has_more {
        format!("pt_{}", end)
    } else {
        String::new()
    };
    (
        StatusCode::OK,
        Json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "items": lark.items[offset..end].to_vec(),
                "has_more": has_more,
                "page_token": page_token,
            }
        })),
    )
}

async fn records(
    State(lark): State<FakeLark>,
    Path((app_token, table_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some((status, reply)) = lark.record_reply.clone() {
        return (StatusCode::from_u16(status).unwrap(), Json(reply));
    }
    lark.written
        .lock()
        .unwrap()
        .push((app_token, table_id, body["fields"].clone()));
    (
        StatusCode::OK,
        Json(json!({
            "code": 0,
            "msg": "success",
            "data": { "record": { "record_id": "recAbc123", "fields": body["fields"] } }
        })),
    )
}

async fn chats(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match params.get("page_token").map(String::as_str) {
        None => Json(json!({
            "code": 0,
            "data": {
                "items": [{ "chat_id": "oc_1", "name": "Ideas", "description": "" }],
                "has_more": true,
                "page_token": "next",
            }
        })),
        Some(_) => Json(json!({
            "code": 0,
            "data": {
                "items": [{ "chat_id": "oc_2", "name": "Ops" }],
                "has_more": false,
            }
        })),
    }
}

async fn serve(lark: FakeLark) -> String {
    let app = Router::new()
        .route("/open-apis/auth/v3/tenant_access_token/internal", post(token))
        .route("/open-apis/im/v1/messages", get(messages))
        .route("/open-apis/im/v1/chats", get(chats))
        .route(
            "/open-apis/bitable/v1/apps/:app_token/tables/:table_id/records",
            post(records),
        )
        .with_state(lark);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base: &str, secret: &str) -> LarkClient {
    LarkClient::new(
        LarkConfig::new("cli_test", secret)
            .with_base_url(base)
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

fn writer(client: LarkClient) -> BitableWriter {
    BitableWriter::new(
        client,
        TableTarget {
            app_token: "bascnApp".to_string(),
            table_id: "tblDaily".to_string(),
            fields: FieldNames::default(),
        },
    )
}

fn run_clock() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-20T23:00:00+08:00")
        .unwrap()
        .with_timezone(&Utc)
}

fn day_items() -> Vec<Value> {
    vec![
        text_item("om_5", "2024-05-20T20:00:00+08:00", "evening idea"),
        json!({
            "message_id": "om_4",
            "msg_type": "image",
            "create_time": ms("2024-05-20T18:00:00+08:00").to_string(),
            "body": { "content": "{\"image_key\":\"img_1\"}" },
        }),
        text_item("om_3", "2024-05-20T14:00:00+08:00", "afternoon idea"),
        text_item("om_2", "2024-05-20T10:00:00+08:00", "morning idea"),
        text_item("om_1", "2024-05-19T23:00:00+08:00", "yesterday"),
    ]
}

struct CannedSummarizer;

#[async_trait]
impl Summarizer for CannedSummarizer {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok("## Key ideas\n- three of them".to_string())
    }
}

// ── Token ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_token_exchange() {
    let base = serve(FakeLark::default()).await;
    let token = client(&base, "secret").fetch_token().await.unwrap();
    assert_eq!(token.as_str(), "t-fake");
}

#[tokio::test]
async fn test_token_rejected_carries_body() {
    let base = serve(FakeLark::default()).await;
    let err = client(&base, "wrong").fetch_token().await.unwrap_err();

    assert!(matches!(err, DigestError::Auth { .. }));
    assert!(err.response_body().unwrap().contains("10014"));
}

#[tokio::test]
async fn test_unreachable_host_is_auth_error() {
    // Port 9 (discard) on localhost is not served by the fake.
    let err = client("http://127.0.0.1:9", "secret").fetch_token().await.unwrap_err();
    assert!(matches!(err, DigestError::Auth { body: None, .. }));
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_collect_through_http_pages() {
    let lark = FakeLark {
        items: Arc::new(day_items()),
        ..Default::default()
    };
    let base = serve(lark.clone()).await;
    let c = client(&base, "secret");
    let token = c.fetch_token().await.unwrap();
    let window = TimeWindow::resolve(8, run_clock()).unwrap();

    let collector = MessageCollector::new(c, CollectorConfig::new().with_page_size(2));
    let collection = collector.collect("oc_ideas", &token, &window).await.unwrap();

    assert_eq!(
        collection.batch.texts(),
        &["morning idea", "afternoon idea", "evening idea"]
    );
    assert_eq!(collection.stop, StopReason::ReachedWindowStart);
    assert_eq!(collection.skipped, 1);

    let queries = lark.message_queries.lock().unwrap();
    assert_eq!(queries[0]["page_size"], "1");
    assert!(!queries[0].contains_key("start_time"));
    assert_eq!(queries[1]["container_id_type"], "chat");
    assert_eq!(queries[1]["container_id"], "oc_ideas");
    assert_eq!(queries[1]["sort_type"], "ByCreateTimeDesc");
    assert_eq!(queries[1]["start_time"], window.bounds_secs().0.to_string());
    assert_eq!(queries[2]["page_token"], "pt_2");
}

#[tokio::test]
async fn test_bad_token_is_fetch_error() {
    let base = serve(FakeLark::default()).await;
    let query = FeedQuery {
        chat_id: "oc_ideas".to_string(),
        page_size: 1,
        page_token: None,
        bounds_secs: None,
    };
    let err = client(&base, "secret")
        .list_messages(&AccessToken::new("t-stale"), &query)
        .await
        .unwrap_err();

    assert!(matches!(err, DigestError::Fetch { .. }));
    assert!(err.response_body().unwrap().contains("99991663"));
}

// ── Records ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_record_written_with_field_names() {
    let lark = FakeLark::default();
    let base = serve(lark.clone()).await;
    let w = writer(client(&base, "secret"));
    let record = TableRecord::new("2024-05-20", &"r".repeat(1000), "summary", DEFAULT_STATUS);

    let id = w.append(&AccessToken::new("t-fake"), &record).await.unwrap();

    assert_eq!(id, "recAbc123");
    let written = lark.written.lock().unwrap();
    let (app, table, fields) = &written[0];
    assert_eq!(app, "bascnApp");
    assert_eq!(table, "tblDaily");
    assert_eq!(fields["Date"], "2024-05-20");
    assert_eq!(fields["AI Summary"], "summary");
    assert_eq!(fields["Status"], DEFAULT_STATUS);
    assert_eq!(fields["Raw Ideas"].as_str().unwrap().chars().count(), 903);
}

#[tokio::test]
async fn test_field_not_found_is_write_error() {
    let lark = FakeLark {
        record_reply: Some((200, json!({ "code": 1254045, "msg": "FieldNameNotFound" }))),
        ..Default::default()
    };
    let base = serve(lark).await;
    let record = TableRecord::new("2024-05-20", "raw", "summary", DEFAULT_STATUS);

    let err = writer(client(&base, "secret"))
        .append(&AccessToken::new("t-fake"), &record)
        .await
        .unwrap_err();

    assert!(matches!(err, DigestError::Write { .. }));
    assert!(err.response_body().unwrap().contains("FieldNameNotFound"));
}

#[tokio::test]
async fn test_missing_record_id_is_write_error() {
    let lark = FakeLark {
        record_reply: Some((200, json!({ "code": 0, "data": { "record": {} } }))),
        ..Default::default()
    };
    let base = serve(lark).await;
    let record = TableRecord::new("2024-05-20", "raw", "summary", DEFAULT_STATUS);

    let err = writer(client(&base, "secret"))
        .append(&AccessToken::new("t-fake"), &record)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no record_id"));
}

// ── Chats ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_chats_follows_pages() {
    let base = serve(FakeLark::default()).await;
    let chats = client(&base, "secret")
        .list_chats(&AccessToken::new("t-fake"))
        .await
        .unwrap();

    let ids: Vec<&str> = chats.iter().map(|c| c.chat_id.as_str()).collect();
    assert_eq!(ids, vec!["oc_1", "oc_2"]);
    assert_eq!(chats[0].name, "Ideas");
}

// ── End to end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pipeline_against_fake_platform() {
    let lark = FakeLark {
        items: Arc::new(day_items()),
        ..Default::default()
    };
    let base = serve(lark.clone()).await;
    let c = client(&base, "secret");
    let mut config = PipelineConfig::new("oc_ideas", 8);
    config.collector = CollectorConfig::new().with_page_size(2);

    let pipeline = Pipeline::new(c.clone(), c.clone(), CannedSummarizer, writer(c), config);
    let report = pipeline.run_at(run_clock()).await.unwrap();

    assert_eq!(report.record_id.as_deref(), Some("recAbc123"));
    assert_eq!(report.message_count, 3);

    let written = lark.written.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(
        written[0].2["Raw Ideas"],
        "morning idea\nafternoon idea\nevening idea"
    );
    assert_eq!(written[0].2["AI Summary"], "## Key ideas\n- three of them");
}

#[tokio::test]
async fn test_pipeline_write_failure_1303() {
    let lark = FakeLark {
        items: Arc::new(day_items()),
        record_reply: Some((200, json!({ "code": 1303, "msg": "field not found" }))),
        ..Default::default()
    };
    let base = serve(lark).await;
    let c = client(&base, "secret");
    let pipeline = Pipeline::new(
        c.clone(),
        c.clone(),
        CannedSummarizer,
        writer(c),
        PipelineConfig::new("oc_ideas", 8),
    );

    let err = pipeline.run_at(run_clock()).await.unwrap_err();

    assert!(matches!(err, DigestError::Write { .. }));
    assert_eq!(
        err.response_body(),
        Some(r#"{"code":1303,"msg":"field not found"}"#)
    );
}

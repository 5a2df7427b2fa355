//! Feishu/Lark open platform adapter.
//!
//! Wire schemas for the token, message, chat and Bitable endpoints, and a reqwest
//! client implementing the digest pipeline's [`TokenProvider`](digest_core::TokenProvider),
//! [`ChatFeed`](digest_core::ChatFeed) and [`RecordSink`](digest_core::RecordSink).
pub mod client;
pub mod types;

pub use client::{
    build_http, BitableWriter, LarkClient, LarkConfig, TableTarget, DEFAULT_BASE_URL,
};
pub use types::ChatSummary;

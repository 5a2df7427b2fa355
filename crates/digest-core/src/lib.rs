pub mod error;
pub mod window;
pub mod message;
pub mod credential;
pub mod collector;
pub mod summary;
pub mod record;
pub mod pipeline;

pub use error::{DigestError, Result};
pub use window::TimeWindow;
pub use message::{MessageBatch, MessageKind, RawMessage, MENTION_PLACEHOLDER};
pub use credential::{AccessToken, TokenProvider};
pub use collector::{
    ChatFeed, Collection, CollectorConfig, FeedPage, FeedQuery, FetchFailurePolicy,
    MessageCollector, StopReason,
};
pub use summary::{
    build_prompt, summarize, Summarizer, SummaryFailurePolicy, FALLBACK_SUMMARY,
    PLACEHOLDER_SUMMARY,
};
pub use record::{
    truncate_field, FieldNames, RecordSink, TableRecord, DEFAULT_STATUS, MAX_FIELD_CHARS,
    TRUNCATION_MARKER,
};
pub use pipeline::{EmptyDayPolicy, Pipeline, PipelineConfig, RunReport, RunState};

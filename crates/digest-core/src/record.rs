use crate::credential::AccessToken;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Longest text the table's text columns accept from this pipeline.
pub const MAX_FIELD_CHARS: usize = 900;

/// Appended to a field that was cut at [`MAX_FIELD_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

/// Status written on every new record.
pub const DEFAULT_STATUS: &str = "Pending review";

/// Keep the first [`MAX_FIELD_CHARS`] characters of `s`, appending the marker when cut.
/// Counts Unicode scalar values so multi-byte text is never split mid-character.
pub fn truncate_field(s: &str) -> String {
    match s.char_indices().nth(MAX_FIELD_CHARS) {
        None => s.to_string(),
        Some((byte_end, _)) => format!("{}{}", &s[..byte_end], TRUNCATION_MARKER),
    }
}

/// Column names in the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub date: String,
    pub raw_ideas: String,
    pub ai_summary: String,
    pub status: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            raw_ideas: "Raw Ideas".to_string(),
            ai_summary: "AI Summary".to_string(),
            status: "Status".to_string(),
        }
    }
}

/// One daily row. Long fields are already truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub date: String,
    pub raw_ideas: String,
    pub ai_summary: String,
    pub status: String,
}

impl TableRecord {
    pub fn new(date: &str, raw_ideas: &str, ai_summary: &str, status: &str) -> Self {
        Self {
            date: date.to_string(),
            raw_ideas: truncate_field(raw_ideas),
            ai_summary: truncate_field(ai_summary),
            status: status.to_string(),
        }
    }

    /// The `fields` object of a create-record request.
    pub fn to_fields(&self, names: &FieldNames) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(names.date.clone(), Value::String(self.date.clone()));
        fields.insert(names.raw_ideas.clone(), Value::String(self.raw_ideas.clone()));
        fields.insert(names.ai_summary.clone(), Value::String(self.ai_summary.clone()));
        fields.insert(names.status.clone(), Value::String(self.status.clone()));
        fields
    }
}

/// Append-only destination for daily records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Submit one record, returning the identifier the store assigned.
    async fn append(&self, token: &AccessToken, record: &TableRecord) -> Result<String>;
}

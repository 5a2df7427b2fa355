use clap::{Args, ValueEnum};
use digest_core::{
    CollectorConfig, DigestError, EmptyDayPolicy, FetchFailurePolicy, FieldNames,
    PipelineConfig, Result, SummaryFailurePolicy, TimeWindow, DEFAULT_STATUS,
};
use lark_adapter::{LarkConfig, TableTarget, DEFAULT_BASE_URL};
use std::time::Duration;

use crate::llm::{CompletionConfig, DEFAULT_COMPLETION_URL, DEFAULT_MODEL};

pub const DEFAULT_OFFSET_HOURS: i32 = 8;

/// Process configuration. Every flag falls back to an environment variable.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Feishu application id
    #[arg(long, global = true, env = "FEISHU_APP_ID")]
    pub app_id: Option<String>,

    /// Feishu application secret
    #[arg(long, global = true, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Group chat to digest
    #[arg(long, global = true, env = "FEISHU_CHAT_ID")]
    pub chat_id: Option<String>,

    /// Bitable app token
    #[arg(long, global = true, env = "BITABLE_APP_TOKEN", hide_env_values = true)]
    pub bitable_app_token: Option<String>,

    /// Bitable table id
    #[arg(long, global = true, env = "BITABLE_TABLE_ID")]
    pub bitable_table_id: Option<String>,

    /// Completion service API key
    #[arg(long, global = true, env = "DASHSCOPE_API_KEY", hide_env_values = true)]
    pub dashscope_api_key: Option<String>,

    /// Whole-hour UTC offset that defines "today" [default: 8]
    #[arg(long, global = true, env = "TIMEZONE_OFFSET", allow_negative_numbers = true)]
    pub timezone_offset: Option<String>,

    /// Open platform base URL
    #[arg(long, global = true, env = "FEISHU_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub feishu_base_url: String,

    /// Completion endpoint
    #[arg(long, global = true, env = "DASHSCOPE_URL", default_value = DEFAULT_COMPLETION_URL)]
    pub dashscope_url: String,

    /// Completion model
    #[arg(long, global = true, env = "DASHSCOPE_MODEL", default_value = DEFAULT_MODEL)]
    pub dashscope_model: String,

    /// Upper bound on completion length
    #[arg(long, global = true, env = "DASHSCOPE_MAX_TOKENS", default_value_t = 1500)]
    pub max_tokens: u32,

    /// Pages walked at most per run
    #[arg(long, global = true, env = "DIGEST_MAX_PAGES", default_value_t = 5)]
    pub max_pages: usize,

    /// Messages per page (1-50)
    #[arg(long, global = true, env = "DIGEST_PAGE_SIZE", default_value_t = 50)]
    pub page_size: u32,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, env = "DIGEST_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Status written on each record
    #[arg(long, global = true, env = "DIGEST_RECORD_STATUS", default_value = DEFAULT_STATUS)]
    pub record_status: String,

    /// Column holding the date
    #[arg(long, global = true, env = "BITABLE_FIELD_DATE", default_value = "Date")]
    pub field_date: String,

    /// Column holding the raw messages
    #[arg(long, global = true, env = "BITABLE_FIELD_RAW", default_value = "Raw Ideas")]
    pub field_raw: String,

    /// Column holding the summary
    #[arg(long, global = true, env = "BITABLE_FIELD_SUMMARY", default_value = "AI Summary")]
    pub field_summary: String,

    /// Column holding the status
    #[arg(long, global = true, env = "BITABLE_FIELD_STATUS", default_value = "Status")]
    pub field_status: String,

    /// Mid-pagination fetch failure handling
    #[arg(long, global = true, env = "DIGEST_ON_FETCH_ERROR", value_enum, default_value_t = FetchPolicyArg::Abort)]
    pub on_fetch_error: FetchPolicyArg,

    /// Completion failure handling
    #[arg(long, global = true, env = "DIGEST_ON_SUMMARY_ERROR", value_enum, default_value_t = SummaryPolicyArg::Abort)]
    pub on_summary_error: SummaryPolicyArg,

    /// Whether a day without messages still gets a record
    #[arg(long, global = true, env = "DIGEST_EMPTY_DAY", value_enum, default_value_t = EmptyDayArg::Write)]
    pub empty_day: EmptyDayArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicyArg {
    Abort,
    KeepPartial,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPolicyArg {
    Abort,
    Placeholder,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyDayArg {
    Write,
    Skip,
}

impl From<FetchPolicyArg> for FetchFailurePolicy {
    fn from(arg: FetchPolicyArg) -> Self {
        match arg {
            FetchPolicyArg::Abort => FetchFailurePolicy::Abort,
            FetchPolicyArg::KeepPartial => FetchFailurePolicy::KeepPartial,
        }
    }
}

impl From<SummaryPolicyArg> for SummaryFailurePolicy {
    fn from(arg: SummaryPolicyArg) -> Self {
        match arg {
            SummaryPolicyArg::Abort => SummaryFailurePolicy::Abort,
            SummaryPolicyArg::Placeholder => SummaryFailurePolicy::Placeholder,
        }
    }
}

impl From<EmptyDayArg> for EmptyDayPolicy {
    fn from(arg: EmptyDayArg) -> Self {
        match arg {
            EmptyDayArg::Write => EmptyDayPolicy::WriteFallback,
            EmptyDayArg::Skip => EmptyDayPolicy::Skip,
        }
    }
}

/// Validated settings for a digest run, built once and passed to each component.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub lark: LarkConfig,
    pub table: TableTarget,
    pub completion: CompletionConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Settings for commands that only talk to the open platform.
    pub fn lark_settings(&self) -> Result<LarkConfig> {
        let mut missing = Vec::new();
        let app_id = required(&self.app_id, "FEISHU_APP_ID", &mut missing);
        let app_secret = required(&self.app_secret, "FEISHU_APP_SECRET", &mut missing);
        fail_on_missing(&missing)?;
        self.check_timeout()?;

        Ok(LarkConfig::new(app_id, app_secret)
            .with_base_url(self.feishu_base_url.clone())
            .with_timeout(self.timeout()))
    }

    /// Everything a digest run needs. Reports all missing variables at once.
    pub fn run_settings(&self) -> Result<RunSettings> {
        let mut missing = Vec::new();
        let app_id = required(&self.app_id, "FEISHU_APP_ID", &mut missing);
        let app_secret = required(&self.app_secret, "FEISHU_APP_SECRET", &mut missing);
        let chat_id = required(&self.chat_id, "FEISHU_CHAT_ID", &mut missing);
        let app_token = required(&self.bitable_app_token, "BITABLE_APP_TOKEN", &mut missing);
        let table_id = required(&self.bitable_table_id, "BITABLE_TABLE_ID", &mut missing);
        let api_key = required(&self.dashscope_api_key, "DASHSCOPE_API_KEY", &mut missing);
        fail_on_missing(&missing)?;
        self.check_timeout()?;

        // Fail on a bad offset before any network call.
        let offset_hours = self.offset_hours()?;
        TimeWindow::today(offset_hours)?;

        let mut pipeline = PipelineConfig::new(chat_id, offset_hours);
        pipeline.status = self.record_status.clone();
        pipeline.empty_day = self.empty_day.into();
        pipeline.on_summary_error = self.on_summary_error.into();
        pipeline.collector = CollectorConfig::new()
            .with_max_pages(self.max_pages)
            .with_page_size(self.page_size)
            .with_fetch_failure_policy(self.on_fetch_error.into());
        pipeline.validate()?;

        if self.max_tokens == 0 {
            return Err(DigestError::Config("DASHSCOPE_MAX_TOKENS must be greater than 0".into()));
        }

        Ok(RunSettings {
            lark: LarkConfig::new(app_id, app_secret)
                .with_base_url(self.feishu_base_url.clone())
                .with_timeout(self.timeout()),
            table: TableTarget {
                app_token,
                table_id,
                fields: FieldNames {
                    date: self.field_date.clone(),
                    raw_ideas: self.field_raw.clone(),
                    ai_summary: self.field_summary.clone(),
                    status: self.field_status.clone(),
                },
            },
            completion: CompletionConfig {
                url: self.dashscope_url.clone(),
                api_key,
                model: self.dashscope_model.clone(),
                max_tokens: self.max_tokens,
                timeout: self.timeout(),
            },
            pipeline,
        })
    }

    /// Unset or blank falls back to the default offset.
    pub fn offset_hours(&self) -> Result<i32> {
        match self.timezone_offset.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_OFFSET_HOURS),
            Some(raw) => raw.parse::<i32>().map_err(|_| {
                DigestError::Config(format!(
                    "TIMEZONE_OFFSET must be a whole number of hours, got {:?}",
                    raw
                ))
            }),
        }
    }

    fn check_timeout(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(DigestError::Config(
                "DIGEST_HTTP_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn required(value: &Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn fail_on_missing(missing: &[&'static str]) -> Result<()> {
    if missing.is_empty() {
        return Ok(());
    }
    Err(DigestError::Config(format!(
        "missing required configuration: {}",
        missing.join(", ")
    )))
}

use crate::collector::{ChatFeed, CollectorConfig, MessageCollector, StopReason};
use crate::credential::TokenProvider;
use crate::error::{DigestError, Result};
use crate::record::{RecordSink, TableRecord, DEFAULT_STATUS};
use crate::summary::{self, Summarizer, SummaryFailurePolicy, PLACEHOLDER_SUMMARY};
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};

/// Whether a day with no usable messages still gets a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyDayPolicy {
    /// Write a record whose summary is the fallback text.
    #[default]
    WriteFallback,
    /// End the run without writing.
    Skip,
}

/// Progress of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    TokenAcquired,
    WindowResolved,
    Collected,
    EmptyExit,
    Summarized,
    Written,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chat_id: String,
    pub offset_hours: i32,
    pub status: String,
    pub empty_day: EmptyDayPolicy,
    pub on_summary_error: SummaryFailurePolicy,
    pub collector: CollectorConfig,
}

impl PipelineConfig {
    pub fn new(chat_id: impl Into<String>, offset_hours: i32) -> Self {
        Self {
            chat_id: chat_id.into(),
            offset_hours,
            status: DEFAULT_STATUS.to_string(),
            empty_day: EmptyDayPolicy::default(),
            on_summary_error: SummaryFailurePolicy::default(),
            collector: CollectorConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chat_id.trim().is_empty() {
            return Err(DigestError::Config("chat id must not be empty".to_string()));
        }
        self.collector.validate()
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: String,
    pub message_count: usize,
    pub stop: StopReason,
    pub summary: String,
    /// `None` when the empty-day policy skipped the write.
    pub record_id: Option<String>,
    /// Last state reached before `Done`: `Written` or `EmptyExit`.
    pub final_state: RunState,
    /// Every state visited, `Idle` through `Done`.
    pub trail: Vec<RunState>,
}

/// Token -> window -> collect -> summarize -> write, once.
pub struct Pipeline<T, F, S, W>
where
    T: TokenProvider,
    F: ChatFeed,
    S: Summarizer,
    W: RecordSink,
{
    tokens: T,
    collector: MessageCollector<F>,
    summarizer: S,
    sink: W,
    config: PipelineConfig,
}

impl<T, F, S, W> Pipeline<T, F, S, W>
where
    T: TokenProvider,
    F: ChatFeed,
    S: Summarizer,
    W: RecordSink,
{
    pub fn new(tokens: T, feed: F, summarizer: S, sink: W, config: PipelineConfig) -> Self {
        let collector = MessageCollector::new(feed, config.collector.clone());
        Self {
            tokens,
            collector,
            summarizer,
            sink,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit clock reading for the window.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let mut trail = vec![RunState::Idle];
        match self.drive(now, &mut trail).await {
            Ok(mut report) => {
                advance(&mut trail, RunState::Done);
                report.trail = trail;
                Ok(report)
            }
            Err(e) => {
                log::error!("Run failed in state {:?}: {}", current(&trail), e);
                advance(&mut trail, RunState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&self, now: DateTime<Utc>, trail: &mut Vec<RunState>) -> Result<RunReport> {
        let token = self.tokens.fetch_token().await?;
        advance(trail, RunState::TokenAcquired);

        let window = TimeWindow::resolve(self.config.offset_hours, now)?;
        let date = window.date_label();
        advance(trail, RunState::WindowResolved);

        let collection = self
            .collector
            .collect(&self.config.chat_id, &token, &window)
            .await?;
        advance(trail, RunState::Collected);
        log::info!(
            "Collected {} message(s) for {} ({:?}, {} page(s), {} skipped)",
            collection.batch.len(),
            date,
            collection.stop,
            collection.pages_read,
            collection.skipped
        );

        let batch = collection.batch;
        let summary = if batch.is_empty() {
            advance(trail, RunState::EmptyExit);
            if self.config.empty_day == EmptyDayPolicy::Skip {
                log::info!("Nothing to summarize for {}, skipping record", date);
                return Ok(RunReport {
                    date,
                    message_count: 0,
                    stop: collection.stop,
                    summary: summary::FALLBACK_SUMMARY.to_string(),
                    record_id: None,
                    final_state: RunState::EmptyExit,
                    trail: Vec::new(),
                });
            }
            log::info!("Nothing to summarize for {}, writing fallback record", date);
            summary::FALLBACK_SUMMARY.to_string()
        } else {
            let summary = match summary::summarize(&self.summarizer, &batch, &date).await {
                Ok(summary) => summary,
                Err(e) if self.config.on_summary_error == SummaryFailurePolicy::Placeholder => {
                    log::warn!("Summarization failed, recording placeholder: {}", e);
                    PLACEHOLDER_SUMMARY.to_string()
                }
                Err(e) => return Err(e),
            };
            advance(trail, RunState::Summarized);
            summary
        };

        let record = TableRecord::new(&date, &batch.joined(), &summary, &self.config.status);
        let record_id = self.sink.append(&token, &record).await?;
        advance(trail, RunState::Written);
        log::info!("Record {} written for {}", record_id, date);

        Ok(RunReport {
            date,
            message_count: batch.len(),
            stop: collection.stop,
            summary,
            record_id: Some(record_id),
            final_state: RunState::Written,
            trail: Vec::new(),
        })
    }
}

fn current(trail: &[RunState]) -> RunState {
    trail.last().copied().unwrap_or(RunState::Idle)
}

fn advance(trail: &mut Vec<RunState>, next: RunState) {
    log::debug!("{:?} -> {:?}", current(trail), next);
    trail.push(next);
}

use crate::credential::AccessToken;
use crate::error::{DigestError, Result};
use crate::message::{MessageBatch, RawMessage};
use crate::window::TimeWindow;
use async_trait::async_trait;

/// One request against the newest-first message feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub chat_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
    /// Optional `[start, end]` bounds in epoch seconds.
    pub bounds_secs: Option<(i64, i64)>,
}

/// One page of the feed, in delivery (newest-first) order.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub messages: Vec<RawMessage>,
    /// Continuation cursor. `None` when the feed has no further pages.
    pub next_cursor: Option<String>,
}

/// Paginated, reverse-chronological chat message feed.
#[async_trait]
pub trait ChatFeed: Send + Sync {
    async fn list_messages(&self, token: &AccessToken, query: &FeedQuery) -> Result<FeedPage>;
}

/// What to do when a page fails after collection has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchFailurePolicy {
    /// Surface the error; nothing collected is kept.
    #[default]
    Abort,
    /// Log the error and return the messages collected so far.
    KeepPartial,
}

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Feed empty, or its newest message predates the window.
    NothingNew,
    /// Hit a message older than the window start.
    ReachedWindowStart,
    /// The last page carried no continuation cursor.
    CursorExhausted,
    /// Read `max_pages` pages without reaching either boundary.
    PageBudgetExhausted,
    /// A page failed under [`FetchFailurePolicy::KeepPartial`].
    FetchFailed,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound on pages walked per run.
    /// Default: 5
    pub max_pages: usize,

    /// Messages per page.
    /// Default: 50
    pub page_size: u32,

    /// Default: Abort
    pub on_fetch_error: FetchFailurePolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            page_size: 50,
            on_fetch_error: FetchFailurePolicy::Abort,
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_fetch_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.on_fetch_error = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(DigestError::Config(
                "max_pages must be greater than 0".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > 50 {
            return Err(DigestError::Config(
                "page_size must be within 1..=50".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one collection pass.
#[derive(Debug)]
pub struct Collection {
    pub batch: MessageBatch,
    pub stop: StopReason,
    pub pages_read: usize,
    /// Messages inside the window that were dropped (non-text, blank, mention, undecodable).
    pub skipped: usize,
    /// The page error swallowed under [`FetchFailurePolicy::KeepPartial`].
    pub fetch_error: Option<DigestError>,
}

impl Collection {
    fn nothing_new() -> Self {
        Self {
            batch: MessageBatch::default(),
            stop: StopReason::NothingNew,
            pages_read: 0,
            skipped: 0,
            fetch_error: None,
        }
    }
}

/// Walks the feed and extracts the texts belonging to one [`TimeWindow`].
pub struct MessageCollector<F: ChatFeed> {
    feed: F,
    config: CollectorConfig,
}

impl<F: ChatFeed> MessageCollector<F> {
    pub fn new(feed: F, config: CollectorConfig) -> Self {
        Self { feed, config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub async fn collect(
        &self,
        chat_id: &str,
        token: &AccessToken,
        window: &TimeWindow,
    ) -> Result<Collection> {
        if !self.has_news(chat_id, token, window).await? {
            log::info!("No messages since {} in chat {}", window.date_label(), chat_id);
            return Ok(Collection::nothing_new());
        }

        let mut newest_first: Vec<String> = Vec::new();
        let mut skipped = 0usize;
        let mut pages_read = 0usize;
        let mut cursor: Option<String> = None;
        let mut fetch_error = None;

        let stop = loop {
            if pages_read == self.config.max_pages {
                break StopReason::PageBudgetExhausted;
            }

            let query = FeedQuery {
                chat_id: chat_id.to_string(),
                page_size: self.config.page_size,
                page_token: cursor.take(),
                bounds_secs: Some(window.bounds_secs()),
            };
            let page = match self.feed.list_messages(token, &query).await {
                Ok(page) => page,
                Err(e) => match self.config.on_fetch_error {
                    FetchFailurePolicy::Abort => return Err(e),
                    FetchFailurePolicy::KeepPartial => {
                        log::warn!(
                            "Page {} failed, keeping {} collected messages: {}",
                            pages_read + 1,
                            newest_first.len(),
                            e
                        );
                        fetch_error = Some(e);
                        break StopReason::FetchFailed;
                    }
                },
            };
            pages_read += 1;

            if scan_page(&page.messages, window, &mut newest_first, &mut skipped) {
                break StopReason::ReachedWindowStart;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break StopReason::CursorExhausted,
            }
        };

        log::debug!(
            "Collection stopped ({:?}) after {} page(s): {} kept, {} skipped",
            stop,
            pages_read,
            newest_first.len(),
            skipped
        );

        Ok(Collection {
            batch: MessageBatch::from_newest_first(newest_first),
            stop,
            pages_read,
            skipped,
            fetch_error,
        })
    }

    /// Peek at the newest message; `false` when the feed holds nothing from the window.
    async fn has_news(&self, chat_id: &str, token: &AccessToken, window: &TimeWindow) -> Result<bool> {
        let probe = FeedQuery {
            chat_id: chat_id.to_string(),
            page_size: 1,
            page_token: None,
            bounds_secs: None,
        };
        let page = self.feed.list_messages(token, &probe).await?;
        Ok(match page.messages.first() {
            Some(newest) => newest.create_time_ms >= window.start_ms,
            None => false,
        })
    }
}

/// Scan one newest-first page, pushing digestible texts.
///
/// Returns `true` once a message older than the window start is seen; the rest of the
/// page and every later page is older still.
fn scan_page(
    messages: &[RawMessage],
    window: &TimeWindow,
    out: &mut Vec<String>,
    skipped: &mut usize,
) -> bool {
    for msg in messages {
        if msg.create_time_ms < window.start_ms {
            return true;
        }
        if msg.create_time_ms > window.end_ms {
            continue;
        }
        match msg.digest_text() {
            Some(text) => out.push(text.to_string()),
            None => *skipped += 1,
        }
    }
    false
}

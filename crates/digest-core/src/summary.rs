use crate::error::{DigestError, Result};
use crate::message::MessageBatch;
use async_trait::async_trait;

/// Summary recorded for a day with no usable messages.
pub const FALLBACK_SUMMARY: &str = "no new ideas today";

/// Summary recorded when the completion call fails under [`SummaryFailurePolicy::Placeholder`].
pub const PLACEHOLDER_SUMMARY: &str = "summary unavailable";

const SYSTEM_PROMPT: &str = "You are an assistant that turns a team's raw group chat \
into a concise daily report. Reply in the language the messages are written in.";

/// A generative completion service.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Fixed system instruction sent alongside every prompt.
    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    /// Issue one completion request and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// What to do when the completion call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFailurePolicy {
    #[default]
    Abort,
    /// Record [`PLACEHOLDER_SUMMARY`] and keep going.
    Placeholder,
}

/// Build the fixed report prompt for one day's messages.
pub fn build_prompt(date: &str, batch: &MessageBatch) -> String {
    format!(
        "Below are the messages posted in our idea-sharing group on {date}, one per line, \
earliest first.\n\n\
Write a structured daily report with these sections:\n\
1. Key ideas: the main ideas and proposals, one bullet each.\n\
2. Decisions and action items: anything agreed or assigned.\n\
3. Open questions: topics raised but not resolved.\n\
Keep it under 300 words and do not invent content that is not in the messages.\n\n\
Messages:\n{messages}",
        date = date,
        messages = batch.joined(),
    )
}

/// Summarize one day's batch.
///
/// An empty batch short-circuits to [`FALLBACK_SUMMARY`] without calling `summarizer`.
/// A blank completion is treated as a failed call.
pub async fn summarize<S>(summarizer: &S, batch: &MessageBatch, date: &str) -> Result<String>
where
    S: Summarizer + ?Sized,
{
    if batch.is_empty() {
        return Ok(FALLBACK_SUMMARY.to_string());
    }

    let prompt = build_prompt(date, batch);
    let completion = summarizer.complete(&prompt).await?;
    let trimmed = completion.trim();
    if trimmed.is_empty() {
        return Err(DigestError::summarization("completion was empty", None));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
        reply: &'static str,
    }

    #[async_trait]
    impl Summarizer for Echo {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn echo(reply: &'static str) -> Echo {
        Echo {
            calls: AtomicUsize::new(0),
            reply,
        }
    }

    #[test]
    fn test_prompt_embeds_date_and_messages() {
        let batch = MessageBatch::new(vec!["first idea".into(), "second idea".into()]);
        let prompt = build_prompt("2024-05-20", &batch);
        assert!(prompt.contains("2024-05-20"));
        assert!(prompt.ends_with("Messages:\nfirst idea\nsecond idea"));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_service() {
        let s = echo("unused");
        let summary = summarize(&s, &MessageBatch::default(), "2024-05-20").await.unwrap();
        assert_eq!(summary, FALLBACK_SUMMARY);
        assert_eq!(s.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completion_is_trimmed() {
        let s = echo("\n  ## Key ideas\n- ship it  \n");
        let batch = MessageBatch::new(vec!["ship it".into()]);
        let summary = summarize(&s, &batch, "2024-05-20").await.unwrap();
        assert_eq!(summary, "## Key ideas\n- ship it");
        assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let s = echo("   ");
        let batch = MessageBatch::new(vec!["x".into()]);
        let err = summarize(&s, &batch, "2024-05-20").await.unwrap_err();
        assert!(matches!(err, DigestError::Summarization { .. }));
    }
}

use async_trait::async_trait;
use digest_core::{DigestError, Result, Summarizer};
use lark_adapter::build_http;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_COMPLETION_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
pub const DEFAULT_MODEL: &str = "qwen-turbo";

#[derive(Clone)]
pub struct CompletionConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    input: CompletionInput<'a>,
    parameters: CompletionParameters,
}

#[derive(Serialize)]
struct CompletionInput<'a> {
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionParameters {
    max_tokens: u32,
    result_format: &'static str,
}

/// Success body. `message` format fills `choices`; `text` format fills `text`.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    output: Option<CompletionOutput>,
}

#[derive(Debug, Deserialize)]
struct CompletionOutput {
    choices: Option<Vec<Choice>>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl CompletionResponse {
    fn into_text(self) -> Option<String> {
        let output = self.output?;
        output
            .choices
            .and_then(|choices| choices.into_iter().next())
            .map(|choice| choice.message.content)
            .or(output.text)
    }
}

/// [`Summarizer`] backed by a DashScope-style text generation endpoint.
pub struct DashScopeSummarizer {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl DashScopeSummarizer {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http = build_http(config.timeout)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Summarizer for DashScopeSummarizer {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            input: CompletionInput {
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: self.system_prompt(),
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt,
                    },
                ],
            },
            parameters: CompletionParameters {
                max_tokens: self.config.max_tokens,
                result_format: "message",
            },
        };

        tracing::debug!(model = %self.config.model, prompt_chars = prompt.chars().count(), "Requesting completion");

        let resp = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DigestError::summarization(format!("completion request failed: {}", e), None))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DigestError::summarization(format!("completion body unreadable: {}", e), None))?;

        if !status.is_success() {
            return Err(DigestError::summarization(
                format!("completion service returned HTTP {}", status),
                Some(body),
            ));
        }
        let parsed: CompletionResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(DigestError::summarization(
                    format!("unreadable completion response: {}", e),
                    Some(body),
                ))
            }
        };
        match parsed.into_text() {
            Some(text) => Ok(text),
            None => Err(DigestError::summarization(
                "completion response has no output text",
                Some(body),
            )),
        }
    }
}

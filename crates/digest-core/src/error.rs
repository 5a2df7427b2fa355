use thiserror::Error;

pub type Result<T> = std::result::Result<T, DigestError>;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Auth error: {reason}")]
    Auth { reason: String, body: Option<String> },

    #[error("Fetch error: {reason}")]
    Fetch { reason: String, body: Option<String> },

    #[error("Summarization error: {reason}")]
    Summarization { reason: String, body: Option<String> },

    #[error("Write error: {reason}")]
    Write { reason: String, body: Option<String> },
}

impl DigestError {
    pub fn auth(reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Auth { reason: reason.into(), body }
    }

    pub fn fetch(reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Fetch { reason: reason.into(), body }
    }

    pub fn summarization(reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Summarization { reason: reason.into(), body }
    }

    pub fn write(reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Write { reason: reason.into(), body }
    }

    /// Raw response body of the call that failed, when one was received.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Config(_) => None,
            Self::Auth { body, .. }
            | Self::Fetch { body, .. }
            | Self::Summarization { body, .. }
            | Self::Write { body, .. } => body.as_deref(),
        }
    }

    /// Short stable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth { .. } => "auth",
            Self::Fetch { .. } => "fetch",
            Self::Summarization { .. } => "summarization",
            Self::Write { .. } => "write",
        }
    }
}

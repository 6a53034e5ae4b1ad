use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("prompt file not found: {}", .0.display())]
    PromptNotFound(PathBuf),

    #[error("prompt file is empty: {}", .0.display())]
    PromptEmpty(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failure classes for a single generation request.
///
/// `RateLimited` and `Transient` are retried under the run's retry policy;
/// `Fatal` never is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    #[error("connection error talking to {provider}: {message}")]
    Transient { provider: String, message: String },

    #[error("{provider} api error ({}): {message}", status_label(.status))]
    Fatal {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }

    pub fn fatal(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fatal {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP response to an error class.
    ///
    /// Gemini reports quota exhaustion as `RESOURCE_EXHAUSTED` in the body,
    /// sometimes without a 429.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        let message = provider_message(body).unwrap_or_else(|| body.trim().to_string());

        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            return Self::RateLimited {
                provider: provider.to_string(),
                message,
            };
        }

        match status {
            408 | 500 | 502 | 503 | 504 | 529 => Self::Transient {
                provider: provider.to_string(),
                message: format!("status {status}: {message}"),
            },
            _ => Self::fatal(provider, Some(status), message),
        }
    }

    /// Connection, timeout and mid-body failures are transient; anything
    /// else reqwest reports is fatal.
    pub fn from_transport(provider: &str, error: &reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() || error.is_body() {
            Self::Transient {
                provider: provider.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::fatal(provider, error.status().map(|status| status.as_u16()), error.to_string())
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "no status".to_string())
}

// Both providers wrap the human-readable reason as `error.message`.
fn provider_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

pub type Result<T, E = BatchError> = std::result::Result<T, E>;

use crate::retry::RetryPolicy;
use crate::BatchError;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const CLAUDE_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Per-run tunables shared by both providers.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub prompt: String,
    pub delay_between_calls: Duration,
    pub retry: RetryPolicy,
}

/// Defaults the CLI falls back to when a tunable is not given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderDefaults {
    pub model: &'static str,
    pub delay_between_calls_secs: f64,
    pub retry_delay_secs: f64,
    pub max_attempts: u32,
}

pub const GEMINI_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "gemini-1.5-flash",
    delay_between_calls_secs: 1.0,
    retry_delay_secs: 30.0,
    max_attempts: 3,
};

pub const CLAUDE_DEFAULTS: ProviderDefaults = ProviderDefaults {
    model: "claude-sonnet-4-20250514",
    delay_between_calls_secs: 2.0,
    retry_delay_secs: 60.0,
    max_attempts: 5,
};

pub const CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS: u32 = 10_000;

/// Reads the instruction text prepended to every document.
pub fn load_prompt(path: &Path) -> Result<String, BatchError> {
    if !path.is_file() {
        return Err(BatchError::PromptNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let prompt = content.trim();
    if prompt.is_empty() {
        return Err(BatchError::PromptEmpty(path.to_path_buf()));
    }

    Ok(prompt.to_string())
}

pub fn seconds(value: f64) -> Result<Duration, BatchError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| BatchError::InvalidArgument(format!("not a valid duration in seconds: {value}")))
}

pub fn parse_base_url(raw: &str) -> Result<Url, BatchError> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(BatchError::InvalidArgument(format!(
            "api base must be an http(s) url: {raw}"
        )));
    }
    Ok(url)
}

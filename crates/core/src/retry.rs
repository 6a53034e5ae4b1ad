use crate::traits::{Sleeper, TextGenerator};
use crate::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

const PROMPT_SEPARATOR: &str = "\n\n---\n\n";

/// Constant-delay retry policy for rate-limited and transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file, including the first.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Builds the single user message sent to a provider.
pub fn compose_request(prompt: &str, document: &str) -> String {
    format!("{prompt}{PROMPT_SEPARATOR}{document}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub attempts: u32,
}

pub async fn generate_with_retry<G>(
    generator: &G,
    prompt: &str,
    document: &str,
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<Generated, ApiError>
where
    G: TextGenerator + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match generator.generate(prompt, document).await {
            Ok(text) => {
                return Ok(Generated {
                    text,
                    attempts: attempt,
                })
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) if attempt >= max_attempts => {
                return Err(ApiError::Exhausted {
                    attempts: attempt,
                    last: Box::new(error),
                })
            }
            Err(error) => {
                warn!(
                    provider = generator.name(),
                    attempt,
                    max_attempts,
                    wait_secs = policy.retry_delay.as_secs_f64(),
                    %error,
                    "retrying after recoverable api error"
                );
                sleeper.sleep(policy.retry_delay).await;
                attempt += 1;
            }
        }
    }
}

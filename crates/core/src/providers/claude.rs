use super::{endpoint, send_json};
use crate::config::{CLAUDE_DEFAULT_BASE_URL, CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS};
use crate::retry::compose_request;
use crate::traits::TextGenerator;
use crate::{ApiError, BatchError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

const PROVIDER: &str = "claude";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub base_url: Url,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BatchError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            max_output_tokens: CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS,
            base_url: Url::parse(CLAUDE_DEFAULT_BASE_URL)?,
        })
    }
}

/// Messages API client; every document is sent as a fresh single-turn
/// conversation.
pub struct ClaudeGenerator {
    client: Client,
    config: ClaudeConfig,
    url: Url,
}

impl ClaudeGenerator {
    pub fn new(config: ClaudeConfig) -> Result<Self, BatchError> {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: ClaudeConfig, client: Client) -> Result<Self, BatchError> {
        if config.max_output_tokens == 0 {
            return Err(BatchError::InvalidArgument(
                "max output tokens must be at least 1".to_string(),
            ));
        }

        let url = endpoint(&config.base_url, "v1/messages")?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, prompt: &str, document: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_output_tokens,
            "messages": [{
                "role": "user",
                "content": compose_request(prompt, document),
            }],
        })
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str, document: &str) -> Result<String, ApiError> {
        let request = self
            .client
            .post(self.url.clone())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(prompt, document));

        let parsed = send_json(PROVIDER, request).await?;
        parse_response(&parsed)
    }
}

fn parse_response(payload: &Value) -> Result<String, ApiError> {
    let blocks = payload
        .pointer("/content")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::fatal(PROVIDER, None, "response has no content blocks"))?;

    Ok(blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server::{client, serve_once, CLOSED_PORT};
    use crate::retry::testing::RecordingSleeper;
    use crate::retry::{generate_with_retry, RetryPolicy};
    use std::time::Duration;

    fn generator_at(base_url: Url) -> ClaudeGenerator {
        let mut config = ClaudeConfig::new("key", "claude-sonnet-4-20250514")
            .expect("default base url parses");
        config.base_url = base_url;
        ClaudeGenerator::with_client(config, client()).expect("valid config")
    }

    fn generator() -> ClaudeGenerator {
        let mut config = ClaudeConfig::new("key", "claude-sonnet-4-20250514")
            .expect("default base url parses");
        config.max_output_tokens = 2_048;
        ClaudeGenerator::new(config).expect("valid config")
    }

    #[test]
    fn request_has_single_user_message_and_token_cap() {
        let body = generator().request_body("Summarize:", "text");
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 2_048);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Summarize:\n\n---\n\ntext");
    }

    #[test]
    fn only_text_blocks_are_kept() {
        let payload = json!({
            "content": [
                { "type": "text", "text": "## Findings\n" },
                { "type": "tool_use", "id": "x", "name": "noop", "input": {} },
                { "type": "text", "text": "- one" }
            ],
            "stop_reason": "end_turn"
        });
        assert_eq!(parse_response(&payload), Ok("## Findings\n- one".to_string()));
    }

    #[test]
    fn missing_content_is_fatal() {
        let error = parse_response(&json!({ "id": "msg" })).expect_err("no content");
        assert!(matches!(error, ApiError::Fatal { .. }));
    }

    #[test]
    fn zero_token_cap_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut config = ClaudeConfig::new("key", "m")?;
        config.max_output_tokens = 0;
        assert!(ClaudeGenerator::new(config).is_err());
        assert_eq!(generator().url.as_str(), "https://api.anthropic.com/v1/messages");
        assert_eq!(generator().model(), "claude-sonnet-4-20250514");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_api_is_transient_and_retried() -> Result<(), Box<dyn std::error::Error>> {
        let generator = generator_at(Url::parse(CLOSED_PORT)?);

        let error = generator.generate("p", "d").await.expect_err("nothing listens");
        assert!(matches!(error, ApiError::Transient { .. }), "{error:?}");

        let retry_delay = Duration::from_secs(7);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(3, retry_delay);
        let error = generate_with_retry(&generator, "p", "d", policy, &sleeper)
            .await
            .expect_err("every attempt fails to connect");

        match error {
            ApiError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ApiError::Transient { .. }));
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.total(), retry_delay * 2);
        Ok(())
    }

    #[tokio::test]
    async fn body_cut_short_is_transient() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"content\":[",
        );
        let error = generator_at(url).generate("p", "d").await.expect_err("truncated body");
        assert!(matches!(error, ApiError::Transient { .. }), "{error:?}");
    }

    #[tokio::test]
    async fn complete_but_malformed_body_is_fatal() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 8\r\nConnection: close\r\n\r\nnot json",
        );
        let error = generator_at(url).generate("p", "d").await.expect_err("malformed body");
        assert!(
            matches!(error, ApiError::Fatal { status: Some(200), .. }),
            "{error:?}"
        );
    }

    #[tokio::test]
    async fn messages_reply_is_parsed_end_to_end() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 41\r\nConnection: close\r\n\r\n{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}]}",
        );
        let text = generator_at(url).generate("p", "d").await;
        assert_eq!(text, Ok("ok".to_string()));
    }
}

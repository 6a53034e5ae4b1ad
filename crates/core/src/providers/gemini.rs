use super::{endpoint, send_json};
use crate::config::GEMINI_DEFAULT_BASE_URL;
use crate::retry::compose_request;
use crate::traits::TextGenerator;
use crate::{ApiError, BatchError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

const PROVIDER: &str = "gemini";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Url,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, BatchError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: Url::parse(GEMINI_DEFAULT_BASE_URL)?,
        })
    }
}

pub struct GeminiGenerator {
    client: Client,
    config: GeminiConfig,
    url: Url,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, BatchError> {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: GeminiConfig, client: Client) -> Result<Self, BatchError> {
        let path = format!("v1beta/models/{}:generateContent", config.model);
        let url = endpoint(&config.base_url, &path)?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &str, document: &str) -> Result<String, ApiError> {
        let request = self
            .client
            .post(self.url.clone())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(prompt, document));

        let parsed = send_json(PROVIDER, request).await?;
        parse_response(&parsed)
    }
}

fn request_body(prompt: &str, document: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": compose_request(prompt, document) }],
        }],
    })
}

fn parse_response(payload: &Value) -> Result<String, ApiError> {
    let Some(candidate) = payload.pointer("/candidates/0") else {
        let reason = payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidates returned");
        return Err(ApiError::fatal(PROVIDER, None, format!("empty response: {reason}")));
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();

    if text.is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        return Err(ApiError::fatal(
            PROVIDER,
            None,
            format!("response had no text (finish reason: {finish})"),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server::{client, serve_once, CLOSED_PORT};
    use crate::retry::testing::RecordingSleeper;
    use crate::retry::{generate_with_retry, RetryPolicy};
    use std::time::Duration;

    fn generator_at(base_url: Url) -> GeminiGenerator {
        let mut config =
            GeminiConfig::new("key", "gemini-1.5-flash").expect("default base url parses");
        config.base_url = base_url;
        GeminiGenerator::with_client(config, client()).expect("valid config")
    }

    #[test]
    fn request_carries_composed_text() {
        let body = request_body("Summarize:", "paper");
        assert_eq!(
            body.pointer("/contents/0/parts/0/text").and_then(Value::as_str),
            Some("Summarize:\n\n---\n\npaper")
        );
    }

    #[test]
    fn response_parts_are_concatenated() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "# Title\n" }, { "text": "body" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_response(&payload), Ok("# Title\nbody".to_string()));
    }

    #[test]
    fn blocked_prompt_is_fatal() {
        let payload = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let error = parse_response(&payload).expect_err("blocked prompt has no text");
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("SAFETY"));
    }

    #[test]
    fn url_targets_model_endpoint() -> Result<(), Box<dyn std::error::Error>> {
        let generator = GeminiGenerator::new(GeminiConfig::new("key", "gemini-1.5-flash")?)?;
        assert_eq!(
            generator.url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(generator.model(), "gemini-1.5-flash");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_api_waits_retry_delay_between_attempts() -> Result<(), Box<dyn std::error::Error>> {
        let generator = generator_at(Url::parse(CLOSED_PORT)?);

        let error = generator.generate("p", "d").await.expect_err("nothing listens");
        assert!(matches!(error, ApiError::Transient { .. }), "{error:?}");

        let retry_delay = Duration::from_secs(30);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(2, retry_delay);
        let error = generate_with_retry(&generator, "p", "d", policy, &sleeper)
            .await
            .expect_err("every attempt fails to connect");

        assert!(matches!(error, ApiError::Exhausted { attempts: 2, .. }), "{error:?}");
        let slept = sleeper.slept.lock().map(|slept| slept.clone()).unwrap_or_default();
        assert_eq!(slept, vec![retry_delay]);
        Ok(())
    }

    #[tokio::test]
    async fn quota_reply_is_rate_limited() {
        let url = serve_once(
            b"HTTP/1.1 429 Too Many Requests\r\nContent-Type: application/json\r\nContent-Length: 59\r\nConnection: close\r\n\r\n{\"error\":{\"message\":\"quota\",\"status\":\"RESOURCE_EXHAUSTED\"}}",
        );
        let error = generator_at(url).generate("p", "d").await.expect_err("quota reply");
        assert_eq!(
            error,
            ApiError::RateLimited {
                provider: "gemini".to_string(),
                message: "quota".to_string(),
            }
        );
    }
}

pub mod claude;
pub mod gemini;

pub use claude::ClaudeGenerator;
pub use gemini::GeminiGenerator;

use crate::{ApiError, BatchError};
use reqwest::RequestBuilder;
use serde_json::Value;
use url::Url;

/// Joins `path` under `base`, keeping any path prefix on the base.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, BatchError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

/// Sends `request` and decodes a successful JSON reply.
///
/// A body that breaks off mid-read is transient; a complete body that is
/// not JSON is fatal.
pub(crate) async fn send_json(provider: &str, request: RequestBuilder) -> Result<Value, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|error| ApiError::from_transport(provider, &error))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_status(provider, status.as_u16(), &body));
    }

    let body = response.bytes().await.map_err(|error| ApiError::Transient {
        provider: provider.to_string(),
        message: format!("response body interrupted: {error}"),
    })?;
    serde_json::from_slice(&body).map_err(|error| {
        ApiError::fatal(
            provider,
            Some(status.as_u16()),
            format!("invalid response body: {error}"),
        )
    })
}

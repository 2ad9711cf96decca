use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, BisubError};
use super::TranslationEndpoint;

/// Client for the unauthenticated Google Translate web endpoint.
///
/// Holds no credentials and no process-wide state; one instance per run.
pub struct GoogleTranslateEndpoint {
    client: Client,
    url: String,
}

impl GoogleTranslateEndpoint {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl TranslationEndpoint for GoogleTranslateEndpoint {
    async fn translate(&self, text: &str, source: &str, target: &str, timeout: Duration) -> Result<String> {
        debug!("Sending translation request ({} chars) to {}", text.len(), self.url);

        let response = self
            .client
            .get(&self.url)
            .query(&[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t"), ("q", text)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| BisubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(BisubError::Translation(format!("Translation endpoint returned {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BisubError::Translation(format!("Failed to parse response: {}", e)))?;

        extract_translation(&body)
    }
}

/// Concatenate the translated chunks of a `translate_a/single` response.
///
/// The body looks like `[[["译文", "source", ...], ...], null, "en", ...]`.
pub fn extract_translation(body: &Value) -> Result<String> {
    let chunks = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| BisubError::Translation("Unexpected response shape".to_string()))?;

    Ok(chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
        .collect())
}

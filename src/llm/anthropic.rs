use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::provider::MessagesClient;
use super::types::{MessagesRequest, MessagesResponse};
use crate::core::config::AnthropicSettings;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    api_version: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(settings: &AnthropicSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        if settings.api_key.trim().is_empty() {
            tracing::warn!("ANTHROPIC_API_KEY is not set; queries will fail until it is configured");
        }

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            api_version: settings.api_version.clone(),
            client,
        })
    }
}

/// Pulls `error.message` out of an Anthropic error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl MessagesClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn create_message(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, ApiError> {
        let url = format!("{}/v1/messages", self.base_url);

        let res = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Anthropic request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Anthropic API error ({}): {}",
                status,
                error_message(&text)
            )));
        }

        let response: MessagesResponse = res.json().await.map_err(|e| {
            ApiError::Upstream(format!("Invalid Anthropic response: {}", e))
        })?;

        tracing::debug!(
            model = %response.model,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Anthropic response received"
        );

        Ok(response)
    }
}

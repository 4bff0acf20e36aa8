//! Chat-completion client (OpenAI-compatible API)

use crate::agent::types::*;
use crate::config::OpenAiConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A service that produces the next assistant message for a conversation.
///
/// The orchestrator and the title pipeline only talk to the model through this
/// trait, so tests can substitute a scripted implementation.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model used when the caller does not override it
    fn default_model(&self) -> &str;

    /// Create one chat completion
    async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}

/// OpenAI chat-completions client
#[derive(Clone)]
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!(
                "Bearer {}",
                config.api_key.expose_secret()
            ))
            .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenAiClient { client, config })
    }

    /// Send a request to the chat-completions endpoint
    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(
            "Sending chat completion: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.as_ref().map_or(0, |t| t.len())
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("chat completion timed out: {}", e))
                } else {
                    Error::ModelCall(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status.is_success() {
            let body = response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| Error::ModelCall(format!("invalid response body: {}", e)))?;

            if let Some(ref usage) = body.usage {
                info!(
                    "Completion response: model={}, tokens={}",
                    body.model, usage.total_tokens
                );
            }

            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                warn!("Rate limit exceeded: {}", error_text);
                Err(Error::RateLimit(error_text))
            } else if status.as_u16() == 401 {
                Err(Error::Unauthorized("Invalid API key".to_string()))
            } else {
                Err(Error::ModelCall(format!(
                    "API error ({}): {}",
                    status, error_text
                )))
            }
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        self.send_request(request).await
    }
}

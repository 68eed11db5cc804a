//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API.
//! Requests are sent once; failures are reported to the caller unchanged.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;
use crate::credentials::ApiKey;

/// Default wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let messages = serde_json::json!([
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt},
        ]);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choice_count = api_response.choices.len(), "parse_response: called");
        let choice = api_response.choices.into_iter().next();

        let (content, stop_reason) = match choice {
            Some(c) => {
                let stop_reason = match c.finish_reason.as_deref() {
                    Some("length") => StopReason::MaxTokens,
                    _ => StopReason::EndTurn,
                };
                (c.message.content, stop_reason)
            }
            None => (None, StopReason::EndTurn),
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            debug!(timeout = ?self.timeout, "map_send_error: request timed out");
            LlmError::Timeout(self.timeout)
        } else {
            debug!(error = %e, "map_send_error: network error");
            LlmError::Network(e)
        }
    }

    /// Turn a non-success response into an error
    async fn error_for_status(response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();

        if status == 429 {
            debug!("error_for_status: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            return LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            };
        }

        debug!(%status, "error_for_status: API error");
        let message = response.text().await.unwrap_or_default();
        LlmError::ApiError { status, message }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, key: &ApiKey, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(&url)
            .bearer_auth(key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        debug!("complete: success");
        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        let api_response: OpenAIResponse = serde_json::from_slice(&bytes)?;
        Ok(self.parse_response(api_response))
    }

    async fn validate_key(&self, key: &ApiKey) -> Result<(), LlmError> {
        debug!("validate_key: called");
        let url = format!("{}/v1/models", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(key.expose())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        debug!("validate_key: key accepted");
        Ok(())
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

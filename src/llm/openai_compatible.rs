// ABOUTME: OpenAI-compatible chat completions client used as the summarization service
// ABOUTME: Works against OpenAI, Ollama, vLLM, LocalAI, or any compatible endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # `OpenAI`-Compatible Summarizer
//!
//! Configured through `SUMMARIZER_BASE_URL`, `SUMMARIZER_MODEL`,
//! `SUMMARIZER_API_KEY` (optional for local servers), and
//! `SUMMARIZER_TIMEOUT_SECS`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::prompts::{summarize_user_prompt, SUMMARIZE_SYSTEM_PROMPT};
use super::SummarizationService;
use crate::config::SummarizerConfig;
use crate::errors::{AppError, AppResult};

/// Service label used in error messages
const SERVICE_NAME: &str = "Summarizer";

/// Connection timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Low temperature keeps summaries factual
const SUMMARY_TEMPERATURE: f32 = 0.3;

// ============================================================================
// API Request/Response Types (OpenAI-compatible format)
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Summarization service backed by an `OpenAI`-compatible chat completions API
pub struct OpenAiCompatibleSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl OpenAiCompatibleSummarizer {
    /// Create a summarizer with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: SummarizerConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Summarization service configured"
        );
        Ok(Self { client, config })
    }

    /// Create a summarizer from environment variables
    ///
    /// Returns `Ok(None)` when `SUMMARIZER_BASE_URL` is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or the HTTP client cannot be created
    pub fn from_env() -> AppResult<Option<Self>> {
        SummarizerConfig::from_env()?.map(Self::new).transpose()
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Add authorization header if API key is configured
    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    /// Map a non-success response onto an error code
    fn parse_error_response(status: StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| parsed.error.message,
        );

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            AppError::external_unavailable(SERVICE_NAME, format!("{status}: {detail}"))
        } else {
            AppError::external_service(SERVICE_NAME, format!("{status}: {detail}"))
        }
    }
}

#[async_trait]
impl SummarizationService for OpenAiCompatibleSummarizer {
    fn name(&self) -> &'static str {
        "openai_compatible"
    }

    #[instrument(skip(self, text), fields(model = %self.config.model, input_len = text.len()))]
    async fn summarize(&self, text: &str, max_output_tokens: usize) -> AppResult<String> {
        let user_prompt = summarize_user_prompt(text, max_output_tokens);
        let request = OpenAiRequest {
            model: &self.config.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: SUMMARIZE_SYSTEM_PROMPT,
                },
                OpenAiMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: u32::try_from(max_output_tokens).unwrap_or(u32::MAX),
            stream: false,
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .json(&request);

        let response = self
            .add_auth_header(http_request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Summarization request failed");
                if e.is_connect() || e.is_timeout() {
                    AppError::external_unavailable(
                        SERVICE_NAME,
                        format!("Cannot reach {}: {e}", self.config.base_url),
                    )
                } else {
                    AppError::external_service(SERVICE_NAME, format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::parse_error_response(status, &body));
        }

        let parsed: OpenAiResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(SERVICE_NAME, format!("Failed to parse response: {e}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service(SERVICE_NAME, "API returned no choices"))?;

        let summary = choice.message.content.unwrap_or_default().trim().to_owned();
        if summary.is_empty() {
            return Err(AppError::external_service(
                SERVICE_NAME,
                "API returned an empty summary",
            ));
        }

        debug!(
            summary_len = summary.len(),
            finish_reason = ?choice.finish_reason,
            "Summary received"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn summarizer(base_url: &str) -> OpenAiCompatibleSummarizer {
        OpenAiCompatibleSummarizer::new(SummarizerConfig {
            base_url: base_url.into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_api_url_joins_without_double_slash() {
        let client = summarizer("http://localhost:11434/v1/");
        assert_eq!(
            client.api_url("chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_rate_limit_maps_to_unavailable() {
        let body = r#"{"error":{"message":"slow down","type":"rate_limit"}}"#;
        let err = OpenAiCompatibleSummarizer::parse_error_response(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(err.code, ErrorCode::ExternalServiceUnavailable);
        assert!(err.message.contains("slow down"));
    }

    #[test]
    fn test_client_error_maps_to_service_error() {
        let err = OpenAiCompatibleSummarizer::parse_error_response(StatusCode::BAD_REQUEST, "nope");
        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert!(err.message.contains("nope"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let client = summarizer("http://127.0.0.1:9");
        let err = client.summarize("user: hi", 50).await.unwrap_err();
        assert!(matches!(
            err.code,
            ErrorCode::ExternalServiceUnavailable | ErrorCode::ExternalServiceError
        ));
    }
}

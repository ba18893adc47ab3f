//! Chat Completions client implementing [`CodeGenerator`]

use crate::config::{LlmConfigError, OpenAiConfig};
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use scenecast_core::{ChatMessage, CodeGenerator, GenerationError, GenerationParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Code generator backed by an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiGenerator {
    /// Build a client for `config`
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmConfigError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    /// Build a client from `OPENAI_*` environment variables
    pub fn from_env() -> Result<Self, LlmConfigError> {
        Self::new(OpenAiConfig::from_env()?)
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn send_request(&self, body: &ChatCompletionRequest<'_>) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| GenerationError::Service {
                status: None,
                message: format!("request failed: {err}"),
                retryable: err.is_connect() || err.is_timeout(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(map_http_error(status, &body_text, retry_after));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            GenerationError::service(format!("failed to parse response: {err}"), false)
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait::async_trait]
impl CodeGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        tracing::debug!(model = %self.config.model, messages = messages.len(), "calling chat completions");
        self.send_request(&request).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(GenerationError::Empty)
}

fn map_http_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> GenerationError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());

    let retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    if let Some(delay) = retry_after {
        tracing::warn!(status = status.as_u16(), retry_after_secs = delay.as_secs(), "service asked to retry later");
    }

    GenerationError::Service {
        status: Some(status.as_u16()),
        message,
        retryable,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

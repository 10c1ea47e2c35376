//! Thin OpenAI chat-completions client.
//!
//! One request, one response, no streaming. Transport and provider
//! failures are mapped onto the gateway error taxonomy here so the
//! callers above only deal in [`GatewayError`].

use std::time::Duration;

use delfi_core::{GatewayError, LlmConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// One chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call sampling controls.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider to emit a JSON object body.
    pub json_response: bool,
}

/// Assistant reply plus the provider's token accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub total_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// HTTP client bound to one model and endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_seconds: u64,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            GatewayError::llm_unavailable(
                "OpenAI API key not configured - set api_key or the configured environment variable",
            )
        })?;

        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let endpoint = format!("{base}/chat/completions");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::llm(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one chat completion request and return the reply text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<Completion, GatewayError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options
                .json_response
                .then(|| json!({ "type": "json_object" })),
        };

        debug!(model = %self.model, messages = messages.len(), "sending chat completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::llm_unavailable(
                "OpenAI API authentication failed - check API key",
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::llm_unavailable(
                "OpenAI API rate limit exceeded",
            ));
        }
        if !status.is_success() {
            return Err(GatewayError::llm(format!(
                "OpenAI API request failed: HTTP {status}"
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::llm(format!("OpenAI API request failed: {e}")))?;

        let Some(choice) = body.choices.into_iter().next() else {
            return Err(GatewayError::llm("OpenAI returned empty response"));
        };
        let content = choice
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| GatewayError::llm("OpenAI returned empty message content"))?;

        Ok(Completion {
            content,
            total_tokens: body.usage.and_then(|usage| usage.total_tokens),
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::llm_timeout(format!(
                "OpenAI API request timed out after {}s",
                self.timeout_seconds
            ))
            .with_details(json!({ "timeout_seconds": self.timeout_seconds }))
        } else {
            GatewayError::llm(format!("OpenAI API request failed: {err}"))
        }
    }
}

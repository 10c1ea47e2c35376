//! LLM scoring of executed results against the original question.
//!
//! The verdict only ever influences the confidence reported to the
//! client; every internal failure degrades to a neutral score instead
//! of failing the request.

use std::time::Duration;

use async_trait::async_trait;
use delfi_core::{GatewayError, LlmConfig, QueryResult, ResultValidationResult, ValidationConfig};
use delfi_runtime::ResultValidator;
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, CompletionOptions};
use crate::prompts;

const VALIDATION_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.0,
    max_tokens: 500,
    json_response: true,
};

/// Neutral score reported when the judge cannot be reached.
const UNAVAILABLE_CONFIDENCE: u8 = 50;
/// Score reported when the judge replied with something unparseable.
const UNPARSEABLE_CONFIDENCE: u8 = 60;

pub struct LlmResultValidator {
    client: ChatClient,
    enabled: bool,
    sample_rows: usize,
    timeout: Duration,
    confidence_threshold: u8,
}

impl LlmResultValidator {
    pub fn new(llm: &LlmConfig, validation: &ValidationConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ChatClient::new(llm)?,
            enabled: validation.enabled,
            sample_rows: validation.sample_rows,
            timeout: Duration::from_secs(validation.timeout_seconds),
            confidence_threshold: validation.confidence_threshold,
        })
    }

    fn verdict(&self, confidence: u8, explanation: String, suggestion: Option<String>) -> ResultValidationResult {
        ResultValidationResult {
            confidence,
            explanation,
            suggestion,
            is_acceptable: confidence >= self.confidence_threshold,
        }
    }

    fn parse_verdict(&self, content: &str) -> ResultValidationResult {
        let parsed: serde_json::Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "result validation reply was not valid JSON");
                return self.verdict(
                    UNPARSEABLE_CONFIDENCE,
                    format!("Validation response parsing failed: {err}"),
                    Some("Unable to parse LLM response, manual verification recommended".to_string()),
                );
            }
        };

        let confidence = parsed
            .get("confidence")
            .and_then(|v| v.as_u64())
            .map(|v| v.min(100) as u8)
            .unwrap_or(UNAVAILABLE_CONFIDENCE);
        let explanation = parsed
            .get("explanation")
            .and_then(|v| v.as_str())
            .unwrap_or("No explanation provided")
            .to_string();
        let suggestion = parsed
            .get("suggestion")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        self.verdict(confidence, explanation, suggestion)
    }
}

#[async_trait]
impl ResultValidator for LlmResultValidator {
    async fn validate(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<ResultValidationResult, GatewayError> {
        if !self.enabled {
            return Ok(ResultValidationResult {
                confidence: 100,
                explanation: "Validation is disabled in configuration".to_string(),
                suggestion: None,
                is_acceptable: true,
            });
        }

        let messages = [
            ChatMessage::system(prompts::VALIDATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::validation_user_prompt(
                question,
                sql,
                result,
                self.sample_rows,
            )),
        ];

        let completion = match tokio::time::timeout(
            self.timeout,
            self.client.complete(&messages, VALIDATION_OPTIONS),
        )
        .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(err)) => {
                warn!(error = %err, "result validation call failed");
                return Ok(self.verdict(
                    UNAVAILABLE_CONFIDENCE,
                    format!("Result validation failed: {err}"),
                    None,
                ));
            }
            Err(_) => {
                warn!(timeout_seconds = self.timeout.as_secs(), "result validation timed out");
                return Ok(self.verdict(
                    UNAVAILABLE_CONFIDENCE,
                    format!(
                        "Result validation timed out after {}s",
                        self.timeout.as_secs()
                    ),
                    None,
                ));
            }
        };

        debug!(reply = %completion.content, "result validation reply");
        Ok(self.parse_verdict(&completion.content))
    }
}

//! LLM-backed routing of questions to databases.
//!
//! Selection is best-effort: any provider failure or malformed reply
//! degrades to the first database in sorted order rather than failing
//! the request.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use delfi_core::{GatewayError, LlmConfig, SelectionResult};
use delfi_runtime::DatabaseSelector;
use regex::Regex;
use tracing::{debug, warn};

use crate::client::{ChatClient, ChatMessage, CompletionOptions};
use crate::prompts;

static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[^{}]*\}").unwrap());

const SELECTION_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.0,
    max_tokens: 200,
    json_response: false,
};

pub struct LlmDatabaseSelector {
    client: ChatClient,
}

impl LlmDatabaseSelector {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ChatClient::new(config)?,
        })
    }
}

#[async_trait]
impl DatabaseSelector for LlmDatabaseSelector {
    async fn select(
        &self,
        question: &str,
        databases: &BTreeMap<String, String>,
    ) -> Result<SelectionResult, GatewayError> {
        let Some(first) = databases.keys().next().cloned() else {
            return Err(GatewayError::database(
                "No databases available for selection",
            ));
        };
        if databases.len() == 1 {
            return Ok(SelectionResult {
                database: first,
                confidence: 1.0,
                reason: "Only one database available".to_string(),
            });
        }

        let messages = [
            ChatMessage::system(prompts::SELECTION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::selection_user_prompt(question, databases)),
        ];
        let completion = match self.client.complete(&messages, SELECTION_OPTIONS).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(error = %err, "database selection call failed");
                return Ok(SelectionResult {
                    database: first,
                    confidence: 0.5,
                    reason: format!(
                        "Selection failed ({}), fallback to first database",
                        err.kind.code()
                    ),
                });
            }
        };

        debug!(reply = %completion.content, "selection reply");
        Ok(parse_selection(&completion.content, databases, &first))
    }
}

/// Interpret a selection reply, degrading to `first` when the reply is
/// not usable.
fn parse_selection(
    content: &str,
    databases: &BTreeMap<String, String>,
    first: &str,
) -> SelectionResult {
    let fallback = |reason: &str| SelectionResult {
        database: first.to_string(),
        confidence: 0.5,
        reason: reason.to_string(),
    };

    let Some(raw) = JSON_OBJECT.find(content) else {
        return fallback("Failed to parse LLM response");
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw.as_str()) else {
        return fallback("Failed to parse LLM response");
    };

    let Some(candidate) = parsed.get("database").and_then(|v| v.as_str()) else {
        return fallback("Failed to parse LLM response");
    };
    let confidence = parsed
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.8)
        .clamp(0.0, 1.0);
    let reason = parsed
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("Selected by LLM")
        .to_string();

    let database = match resolve_name(candidate, databases) {
        Some(name) => name,
        None => {
            warn!(candidate, "selector returned unknown database name");
            first.to_string()
        }
    };
    SelectionResult {
        database,
        confidence,
        reason,
    }
}

/// Match the model's answer against configured names, tolerating case
/// differences and partial names in either direction.
fn resolve_name(candidate: &str, databases: &BTreeMap<String, String>) -> Option<String> {
    if databases.contains_key(candidate) {
        return Some(candidate.to_string());
    }
    let lowered = candidate.to_lowercase();
    databases
        .keys()
        .find(|name| {
            let name_lower = name.to_lowercase();
            name_lower.contains(&lowered) || lowered.contains(&name_lower)
        })
        .cloned()
}

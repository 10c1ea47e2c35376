//! LLM seams used by the orchestrator.
//!
//! `delfi-llm` provides the OpenAI-backed implementations; the
//! orchestrator only sees these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use delfi_core::{
    DatabaseSchema, GatewayError, QueryResult, ResultValidationResult, SelectionResult,
};

/// SQL produced by one generation call.
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    pub sql: String,
    /// Total tokens reported by the provider, when available.
    pub tokens_used: Option<u32>,
}

/// Turns a natural-language question into a single SQL statement.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// On retry, `previous_sql` and `error_feedback` carry the
    /// rejected statement and the validator's message so the model
    /// can correct itself.
    async fn generate(
        &self,
        question: &str,
        schema: &DatabaseSchema,
        previous_sql: Option<&str>,
        error_feedback: Option<&str>,
    ) -> Result<GeneratedSql, GatewayError>;
}

/// Judges whether executed results plausibly answer the question.
#[async_trait]
pub trait ResultValidator: Send + Sync {
    async fn validate(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<ResultValidationResult, GatewayError>;
}

/// Routes a question to one of several configured databases.
#[async_trait]
pub trait DatabaseSelector: Send + Sync {
    /// `databases` maps database name to its configured description;
    /// descriptions may be empty strings.
    async fn select(
        &self,
        question: &str,
        databases: &BTreeMap<String, String>,
    ) -> Result<SelectionResult, GatewayError>;
}

//! OpenAI-backed SQL generation.

use std::sync::LazyLock;

use async_trait::async_trait;
use delfi_core::{DatabaseSchema, GatewayError, LlmConfig};
use delfi_runtime::{GeneratedSql, SqlGenerator};
use regex::Regex;
use tracing::debug;

use crate::client::{ChatClient, ChatMessage, CompletionOptions};
use crate::prompts;

static FENCED_SQL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:sql)?\s*\n?(.*?)\n?```").unwrap());

static INLINE_SQL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)((?:WITH|SELECT)\s+.*?)(?:;|$)").unwrap());

/// Generates SQL through the OpenAI chat completions API.
pub struct OpenAiSqlGenerator {
    client: ChatClient,
    options: CompletionOptions,
}

impl OpenAiSqlGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: ChatClient::new(config)?,
            options: CompletionOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                json_response: false,
            },
        })
    }
}

#[async_trait]
impl SqlGenerator for OpenAiSqlGenerator {
    async fn generate(
        &self,
        question: &str,
        schema: &DatabaseSchema,
        previous_sql: Option<&str>,
        error_feedback: Option<&str>,
    ) -> Result<GeneratedSql, GatewayError> {
        let messages = [
            ChatMessage::system(prompts::GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::generation_user_prompt(
                question,
                &schema.to_prompt_string(),
                previous_sql,
                error_feedback,
            )),
        ];
        let completion = self.client.complete(&messages, self.options).await?;
        let sql = extract_sql(&completion.content)?;
        debug!(model = self.client.model(), %sql, "extracted SQL from completion");
        Ok(GeneratedSql {
            sql,
            tokens_used: completion.total_tokens,
        })
    }
}

/// Pull a SQL statement out of a model reply.
///
/// Tries, in order: a fenced code block, the first SELECT/WITH run of
/// text up to a semicolon, and finally the whole reply when it already
/// starts with SELECT or WITH. The result always carries exactly one
/// trailing semicolon.
fn extract_sql(content: &str) -> Result<String, GatewayError> {
    if let Some(captures) = FENCED_SQL.captures(content) {
        if let Some(sql) = finish_sql(&captures[1]) {
            return Ok(sql);
        }
    }

    if let Some(captures) = INLINE_SQL.captures(content) {
        if let Some(sql) = finish_sql(&captures[1]) {
            return Ok(sql);
        }
    }

    let trimmed = content.trim();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("SELECT") || upper.starts_with("WITH") {
        if let Some(sql) = finish_sql(trimmed) {
            return Ok(sql);
        }
    }

    Err(GatewayError::llm("Failed to extract SQL from OpenAI response"))
}

fn finish_sql(raw: &str) -> Option<String> {
    let body = raw.trim().trim_end_matches(';').trim_end();
    if body.is_empty() {
        return None;
    }
    Some(format!("{body};"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extracts_fenced_block_with_language_tag() {
        let content = "Here you go:\n```sql\nSELECT id FROM users\n```\nHope that helps.";
        assert_eq!(extract_sql(content).unwrap(), "SELECT id FROM users;");
    }

    #[test]
    fn test_extracts_fenced_block_without_language_tag() {
        let content = "```\nSELECT count(*) FROM orders\n```";
        assert_eq!(extract_sql(content).unwrap(), "SELECT count(*) FROM orders;");
    }

    #[test]
    fn test_fence_tag_is_case_insensitive() {
        let content = "```SQL\nSELECT 1\n```";
        assert_eq!(extract_sql(content).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_extracts_inline_select_from_prose() {
        let content = "The query you want is SELECT name FROM users WHERE active = true; let me know.";
        assert_eq!(
            extract_sql(content).unwrap(),
            "SELECT name FROM users WHERE active = true;"
        );
    }

    #[test]
    fn test_accepts_bare_select_reply() {
        assert_eq!(
            extract_sql("select id, name from users").unwrap(),
            "select id, name from users;"
        );
    }

    #[test]
    fn test_accepts_cte_reply() {
        let content = "WITH recent AS (SELECT * FROM orders) SELECT count(*) FROM recent";
        assert_eq!(
            extract_sql(content).unwrap(),
            "WITH recent AS (SELECT * FROM orders) SELECT count(*) FROM recent;"
        );
    }

    #[test]
    fn test_normalizes_trailing_semicolons() {
        assert_eq!(extract_sql("SELECT 1;;  ").unwrap(), "SELECT 1;");
        assert_eq!(extract_sql("```sql\nSELECT 1;\n```").unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_multiline_statement_survives_extraction() {
        let content = "```sql\nSELECT u.id,\n       u.name\nFROM users u\nWHERE u.active\n```";
        assert_eq!(
            extract_sql(content).unwrap(),
            "SELECT u.id,\n       u.name\nFROM users u\nWHERE u.active;"
        );
    }

    #[test]
    fn test_empty_fence_falls_through_to_error() {
        let err = extract_sql("```sql\n\n```").unwrap_err();
        assert_eq!(err.message, "Failed to extract SQL from OpenAI response");
    }

    #[test]
    fn test_prose_without_sql_is_an_error() {
        let err = extract_sql("I cannot answer that question.").unwrap_err();
        assert_eq!(err.message, "Failed to extract SQL from OpenAI response");
        assert_eq!(err.kind.code(), "llm_error");
    }
}

//! Query request and response models.
//!
//! These are the types that cross the gateway boundary: the incoming
//! question, the validation verdicts, and the structured response with
//! either result data or a coded error.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::error::GatewayError;

/// Maximum accepted question length in characters.
pub const MAX_QUESTION_LEN: usize = 10_000;

/// What the client wants back: the generated SQL, or executed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Return only the generated SQL without executing it.
    Sql,
    /// Execute the query and return results.
    #[default]
    Result,
}

/// Error raised when a request fails basic parameter validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Question cannot be empty")]
    EmptyQuestion,
    #[error("Question exceeds maximum length of {MAX_QUESTION_LEN} characters")]
    QuestionTooLong,
}

/// Query request containing a natural language question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Natural language question about the data, trimmed and non-empty.
    pub question: String,
    /// Target database name; resolved by the orchestrator when absent.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub return_type: ReturnType,
}

impl QueryRequest {
    /// Build a request, trimming the question and enforcing length bounds.
    pub fn new(question: impl Into<String>) -> Result<Self, RequestError> {
        let question = question.into();
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(RequestError::EmptyQuestion);
        }
        if trimmed.chars().count() > MAX_QUESTION_LEN {
            return Err(RequestError::QuestionTooLong);
        }
        Ok(Self {
            question: trimmed.to_string(),
            database: None,
            return_type: ReturnType::default(),
        })
    }

    /// Target a specific database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Override the return type.
    pub fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }
}

/// Result of SQL security validation checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether SQL passed validation.
    pub is_valid: bool,
    /// Whether SQL is a SELECT statement.
    #[serde(default)]
    pub is_select: bool,
    /// Whether SQL contains write operations.
    #[serde(default)]
    pub allows_data_modification: bool,
    /// Blocked functions found in the SQL.
    #[serde(default)]
    pub uses_blocked_functions: Vec<String>,
    /// Validation error message if invalid.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ValidationResult {
    /// Verdict for SQL that passed every check.
    pub fn all_clear() -> Self {
        Self {
            is_valid: true,
            is_select: true,
            allows_data_modification: false,
            uses_blocked_functions: Vec::new(),
            error_message: None,
        }
    }

    /// True when the SQL is safe to execute.
    pub fn is_safe(&self) -> bool {
        self.is_valid
            && self.is_select
            && !self.allows_data_modification
            && self.uses_blocked_functions.is_empty()
    }
}

/// LLM assessment of whether query results answer the original question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultValidationResult {
    /// Confidence score (0-100) that results match the question.
    pub confidence: u8,
    /// Explanation of the assessment.
    pub explanation: String,
    /// Optional suggestion for improving the query.
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Whether results meet the configured confidence threshold.
    pub is_acceptable: bool,
}

/// Result data from query execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result-set order.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Result rows as JSON objects keyed by column name.
    #[serde(default)]
    pub rows: Vec<Value>,
    /// Number of rows returned (after the row cap was applied).
    #[serde(default)]
    pub row_count: usize,
    /// Query execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: f64,
}

/// Coded error information returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code identifier.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional error context.
    #[serde(default)]
    pub details: Option<Value>,
}

impl From<&GatewayError> for ErrorDetail {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

/// Complete query response.
///
/// Invariants: `data` is present only on success, `error` is present
/// exactly when `success` is false, and never both at once. The
/// constructors below are the only ways the gateway builds responses,
/// which keeps those invariants by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Whether the query succeeded.
    pub success: bool,
    /// Generated SQL query, when generation got that far.
    #[serde(default)]
    pub generated_sql: Option<String>,
    /// SQL validation verdict.
    #[serde(default)]
    pub validation: Option<ValidationResult>,
    /// Query result data, when executed.
    #[serde(default)]
    pub data: Option<QueryResult>,
    /// Error information when failed.
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    /// Confidence score (0-100) for result quality.
    pub confidence: u8,
    /// LLM tokens consumed; serialized as 0 when unknown.
    #[serde(default, serialize_with = "tokens_or_zero")]
    pub tokens_used: Option<u32>,
}

fn tokens_or_zero<S: Serializer>(v: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(v.unwrap_or(0))
}

impl QueryResponse {
    /// Successful response carrying executed result data.
    pub fn success(
        generated_sql: String,
        validation: ValidationResult,
        data: QueryResult,
        confidence: u8,
        tokens_used: Option<u32>,
    ) -> Self {
        Self {
            success: true,
            generated_sql: Some(generated_sql),
            validation: Some(validation),
            data: Some(data),
            error: None,
            confidence: confidence.min(100),
            tokens_used,
        }
    }

    /// Successful response carrying only the generated SQL.
    pub fn sql_only(
        generated_sql: String,
        validation: ValidationResult,
        tokens_used: Option<u32>,
    ) -> Self {
        Self {
            success: true,
            generated_sql: Some(generated_sql),
            validation: Some(validation),
            data: None,
            error: None,
            confidence: 100,
            tokens_used,
        }
    }

    /// Failed response built from a gateway error.
    pub fn failure(err: &GatewayError) -> Self {
        Self {
            success: false,
            generated_sql: None,
            validation: None,
            data: None,
            error: Some(ErrorDetail::from(err)),
            confidence: 0,
            tokens_used: None,
        }
    }
}

/// Outcome of routing a question to one of several configured databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected database name.
    pub database: String,
    /// Confidence score between 0.0 and 1.0.
    pub confidence: f64,
    /// Explanation for the selection.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_trims_and_rejects_empty() {
        let req = QueryRequest::new("  how many users?  ").unwrap();
        assert_eq!(req.question, "how many users?");
        assert_eq!(req.return_type, ReturnType::Result);

        assert_eq!(
            QueryRequest::new("   \n\t "),
            Err(RequestError::EmptyQuestion)
        );
    }

    #[test]
    fn request_rejects_oversized_question() {
        let long = "x".repeat(MAX_QUESTION_LEN + 1);
        assert_eq!(
            QueryRequest::new(long),
            Err(RequestError::QuestionTooLong)
        );
    }

    #[test]
    fn all_clear_is_safe() {
        let v = ValidationResult::all_clear();
        assert!(v.is_safe());

        let tainted = ValidationResult {
            uses_blocked_functions: vec!["pg_sleep".to_string()],
            ..ValidationResult::all_clear()
        };
        assert!(!tainted.is_safe());
    }

    #[test]
    fn failure_response_carries_code_and_no_data() {
        let err = GatewayError::security_violation("DROP statements are not allowed.");
        let resp = QueryResponse::failure(&err);
        assert!(!resp.success);
        assert!(resp.data.is_none());
        assert_eq!(resp.confidence, 0);
        let detail = resp.error.unwrap();
        assert_eq!(detail.code, "security_violation");
        assert_eq!(detail.message, "DROP statements are not allowed.");
    }

    #[test]
    fn tokens_used_serializes_as_zero_when_unknown() {
        let resp = QueryResponse::sql_only(
            "SELECT 1;".to_string(),
            ValidationResult::all_clear(),
            None,
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["tokens_used"], serde_json::json!(0));
        assert_eq!(json["success"], serde_json::json!(true));
    }

    #[test]
    fn return_type_round_trips_lowercase() {
        assert_eq!(
            serde_json::to_value(ReturnType::Sql).unwrap(),
            serde_json::json!("sql")
        );
        let rt: ReturnType = serde_json::from_value(serde_json::json!("result")).unwrap();
        assert_eq!(rt, ReturnType::Result);
    }
}

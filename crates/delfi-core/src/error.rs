//! Error taxonomy for the query gateway.
//!
//! Every failure that can reach a client is a [`GatewayError`] carrying a
//! machine-readable kind, a human-readable message, and optional structured
//! details. Error identity is dispatched on the kind tag, and each kind maps
//! to a stable wire code.

use serde_json::Value;
use std::fmt;

/// Categories of gateway failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database missing, unreachable, or query execution failed.
    Database,
    /// Schema introspection failed for a configured database.
    SchemaLoad,
    /// SQL violated a security rule.
    SecurityViolation,
    /// SQL could not be parsed.
    SqlParse,
    /// LLM call failed.
    Llm,
    /// LLM call timed out.
    LlmTimeout,
    /// LLM endpoint rejected the call (authentication, quota).
    LlmUnavailable,
    /// A concurrency slot was not acquired in time.
    RateLimitExceeded,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Stable wire code for this kind, as returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database_error",
            ErrorKind::SchemaLoad => "schema_load_error",
            ErrorKind::SecurityViolation => "security_violation",
            ErrorKind::SqlParse => "sql_parse_error",
            ErrorKind::Llm => "llm_error",
            ErrorKind::LlmTimeout => "llm_timeout",
            ErrorKind::LlmUnavailable => "llm_unavailable",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Error type for all gateway failures.
#[derive(Debug, Clone)]
pub struct GatewayError {
    /// The kind of failure.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Additional structured context, safe to return to clients.
    pub details: Option<Value>,
}

impl GatewayError {
    /// Create a new gateway error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a schema load error.
    pub fn schema_load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaLoad, message)
    }

    /// Create a security violation error.
    pub fn security_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecurityViolation, message)
    }

    /// Create a SQL parse error.
    pub fn sql_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SqlParse, message)
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Llm, message)
    }

    /// Create an LLM timeout error.
    pub fn llm_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmTimeout, message)
    }

    /// Create an LLM unavailable error.
    pub fn llm_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmUnavailable, message)
    }

    /// Create a rate limit exceeded error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimitExceeded, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// True for failures raised by the LLM boundary itself.
    pub fn is_llm(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Llm | ErrorKind::LlmTimeout | ErrorKind::LlmUnavailable
        )
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(ErrorKind::Database.code(), "database_error");
        assert_eq!(ErrorKind::SchemaLoad.code(), "schema_load_error");
        assert_eq!(ErrorKind::SecurityViolation.code(), "security_violation");
        assert_eq!(ErrorKind::SqlParse.code(), "sql_parse_error");
        assert_eq!(ErrorKind::Llm.code(), "llm_error");
        assert_eq!(ErrorKind::LlmTimeout.code(), "llm_timeout");
        assert_eq!(ErrorKind::LlmUnavailable.code(), "llm_unavailable");
        assert_eq!(ErrorKind::RateLimitExceeded.code(), "rate_limit_exceeded");
        assert_eq!(ErrorKind::Internal.code(), "internal_error");
    }

    #[test]
    fn details_are_attached() {
        let err = GatewayError::database("Database 'orders' not found")
            .with_details(json!({"requested_database": "orders"}));
        assert_eq!(err.kind, ErrorKind::Database);
        assert_eq!(err.to_string(), "Database 'orders' not found");
        assert_eq!(
            err.details,
            Some(json!({"requested_database": "orders"}))
        );
    }

    #[test]
    fn llm_kinds_are_grouped() {
        assert!(GatewayError::llm("x").is_llm());
        assert!(GatewayError::llm_timeout("x").is_llm());
        assert!(GatewayError::llm_unavailable("x").is_llm());
        assert!(!GatewayError::database("x").is_llm());
    }
}

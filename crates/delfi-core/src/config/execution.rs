//! Query execution limits.

use serde::{Deserialize, Serialize};

/// Limits applied when executing validated SQL against Postgres.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum rows returned to the client; excess rows are truncated.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Per-statement timeout in seconds, enforced server-side via
    /// `statement_timeout`.
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time_seconds: u64,

    /// Role to switch to before executing, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly_role: Option<String>,

    /// `search_path` applied to every query session.
    #[serde(default = "default_search_path")]
    pub search_path: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            max_execution_time_seconds: default_max_execution_time(),
            readonly_role: None,
            search_path: default_search_path(),
        }
    }
}

impl ExecutionConfig {
    /// Statement timeout in milliseconds for `SET LOCAL statement_timeout`.
    pub fn statement_timeout_ms(&self) -> u64 {
        self.max_execution_time_seconds * 1000
    }
}

// Default value functions
fn default_max_rows() -> usize {
    10_000
}

fn default_max_execution_time() -> u64 {
    30
}

fn default_search_path() -> String {
    "public".to_string()
}

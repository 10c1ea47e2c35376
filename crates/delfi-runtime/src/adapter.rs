//! Database adapter seams.
//!
//! The orchestrator never talks to a driver directly. Concrete
//! adapters (see `delfi-adapter-pg`) implement these traits; tests
//! substitute in-memory fakes.

use async_trait::async_trait;
use delfi_core::{GatewayError, TableInfo};

/// Rows produced by one bounded query execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Column names in result-set order. Empty when no rows came back.
    pub columns: Vec<String>,
    /// Rows as JSON objects keyed by column name, already capped at
    /// the configured row limit.
    pub rows: Vec<serde_json::Value>,
    /// Row count before the cap was applied.
    pub total_rows: usize,
}

/// Source of table structure for one database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Snapshot the tables visible to the gateway's database role.
    async fn introspect(&self) -> Result<Vec<TableInfo>, GatewayError>;
}

/// Executes already-validated SQL against one database.
///
/// Implementations must run the statement inside a read-only
/// transaction with a statement timeout.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome, GatewayError>;
}

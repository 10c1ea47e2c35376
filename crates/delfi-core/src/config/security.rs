//! SQL security policy configuration.

use serde::{Deserialize, Serialize};

/// Policy knobs consumed by the SQL validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether INSERT/UPDATE/DELETE/MERGE statements are allowed.
    ///
    /// DDL and administrative statements are rejected regardless of
    /// this setting.
    #[serde(default)]
    pub allow_write_operations: bool,

    /// Whether plain EXPLAIN statements are allowed.
    #[serde(default)]
    pub allow_explain: bool,

    /// Functions to block in addition to the built-in deny list.
    #[serde(default)]
    pub blocked_functions: Vec<String>,

    /// Tables that queries may never reference.
    #[serde(default)]
    pub blocked_tables: Vec<String>,

    /// Columns that queries may never reference. Entries may be bare
    /// column names or qualified as `table.column`.
    #[serde(default)]
    pub blocked_columns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_write_operations: false,
            allow_explain: false,
            blocked_functions: Vec::new(),
            blocked_tables: Vec::new(),
            blocked_columns: Vec::new(),
        }
    }
}

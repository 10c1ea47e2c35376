//! Introspected database schema snapshot.
//!
//! A `DatabaseSchema` is loaded once per cache refresh and then shared
//! read-only. It is never mutated in place; refreshes build a new
//! snapshot and replace the old one wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Postgres data type as reported by `information_schema.columns`.
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
}

/// A foreign key constraint, possibly spanning multiple columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub constraint: String,
    pub columns: Vec<String>,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// One table with its columns and key constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableInfo {
    /// Schema-qualified table name, e.g. `public.users`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Immutable snapshot of one database's structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// Logical database name the snapshot was loaded from.
    pub database: String,
    /// Tables in introspection order (schema name, then table name).
    pub tables: Vec<TableInfo>,
    /// Monotonic per-database snapshot counter, starting at 1.
    pub version: u64,
    /// When the snapshot was loaded; drives TTL expiry.
    pub fetched_at: DateTime<Utc>,
}

impl DatabaseSchema {
    pub fn new(database: impl Into<String>, tables: Vec<TableInfo>, version: u64) -> Self {
        Self {
            database: database.into(),
            tables,
            version,
            fetched_at: Utc::now(),
        }
    }

    /// Age of the snapshot in whole seconds.
    pub fn age_seconds(&self) -> i64 {
        Utc::now().signed_duration_since(self.fetched_at).num_seconds()
    }

    /// Qualified names of all tables, in snapshot order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(TableInfo::qualified_name).collect()
    }

    /// Render the schema as prompt context for SQL generation.
    ///
    /// The format is plain DDL-like text: one block per table listing
    /// columns with types, nullability, and key constraints.
    pub fn to_prompt_string(&self) -> String {
        let mut out = format!("Database: {}\n", self.database);
        for table in &self.tables {
            out.push_str(&format!("\nTable {}:\n", table.qualified_name()));
            for col in &table.columns {
                out.push_str(&format!("  - {} {}", col.name, col.data_type));
                if !col.nullable {
                    out.push_str(" NOT NULL");
                }
                if table.primary_key.iter().any(|k| k == &col.name) {
                    out.push_str(" PRIMARY KEY");
                }
                if let Some(default) = &col.default {
                    out.push_str(&format!(" DEFAULT {default}"));
                }
                out.push('\n');
            }
            for fk in &table.foreign_keys {
                out.push_str(&format!(
                    "  - FOREIGN KEY ({}) REFERENCES {}.{} ({})\n",
                    fk.columns.join(", "),
                    fk.referenced_schema,
                    fk.referenced_table,
                    fk.referenced_columns.join(", "),
                ));
            }
        }
        out
    }
}

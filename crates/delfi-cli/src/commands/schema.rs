//! `delfi schema` command implementation.
//!
//! Connects to one configured database, introspects it, and prints
//! the same table/column summary the SQL generator sees in its prompt.

use std::path::Path;

use anyhow::Result;
use delfi_adapter_pg::PgDatabase;
use delfi_core::DatabaseSchema;
use delfi_runtime::SchemaSource;

pub async fn run(config_path: &Path, database: &str) -> Result<()> {
    let config = super::load_config(config_path)?;

    let db_config = config.databases.get(database).ok_or_else(|| {
        let known = config.database_names();
        let known = if known.is_empty() {
            "none".to_string()
        } else {
            known.join(", ")
        };
        anyhow::anyhow!("Database '{database}' is not configured. Known databases: {known}")
    })?;

    let source = PgDatabase::connect(database, db_config, &config.execution).await?;
    let tables = source.introspect().await?;
    let schema = DatabaseSchema::new(database, tables, 1);

    println!("{}", schema.to_prompt_string());
    println!("{} table(s)", schema.tables.len());
    Ok(())
}

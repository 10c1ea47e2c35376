//! `delfi validate` command implementation.
//!
//! Runs the security validator on a SQL statement without touching
//! any database, then prints the verdict, the normalized statement,
//! and the tables it references.

use std::path::Path;

use anyhow::Result;
use delfi_guard::SqlValidator;

pub fn run(config_path: &Path, sql: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let validator = SqlValidator::new(&config.security);

    let verdict = validator.validate(sql);
    if !verdict.is_valid {
        println!("✗ SQL rejected");
        if let Some(message) = &verdict.error_message {
            println!("  {message}");
        }
        std::process::exit(1);
    }

    println!("✓ SQL passed validation");
    println!("  Normalized: {}", validator.normalize_sql(sql)?);

    let tables = validator.extract_tables(sql)?;
    if tables.is_empty() {
        println!("  Tables: (none)");
    } else {
        println!("  Tables: {}", tables.join(", "));
    }
    Ok(())
}

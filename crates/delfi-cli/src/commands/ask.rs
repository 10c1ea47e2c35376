//! `delfi ask` command implementation.
//!
//! Builds the full gateway pipeline from the configuration file, runs
//! one question through it, and prints the response as pretty JSON.
//! Exits non-zero when the query fails so shell scripts can branch on
//! the outcome.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use delfi_adapter_pg::PgDatabase;
use delfi_core::{GatewayConfig, QueryRequest, ReturnType};
use delfi_llm::{LlmDatabaseSelector, LlmResultValidator, OpenAiSqlGenerator};
use delfi_runtime::{Catalog, CatalogEntry, LogMetrics, Orchestrator, QueryExecutor, SchemaSource};
use tracing::info;

pub async fn run(
    config_path: &Path,
    question: &str,
    database: Option<String>,
    return_type: ReturnType,
) -> Result<()> {
    let config = Arc::new(super::load_config(config_path)?);

    if config.databases.is_empty() {
        anyhow::bail!(
            "No databases configured in {}. Add at least one under `databases:`.",
            config_path.display()
        );
    }

    let mut request = QueryRequest::new(question)?;
    if let Some(name) = database {
        request = request.with_database(name);
    }
    request = request.with_return_type(return_type);

    let orchestrator = build_orchestrator(Arc::clone(&config)).await?;

    let response = orchestrator.process(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Connect every configured database and assemble the orchestrator
/// with its LLM collaborators.
async fn build_orchestrator(config: Arc<GatewayConfig>) -> Result<Orchestrator> {
    let mut catalog = Catalog::new();
    for (name, db_config) in &config.databases {
        let database = Arc::new(
            PgDatabase::connect(name, db_config, &config.execution)
                .await
                .with_context(|| {
                    format!(
                        "Failed to connect to database '{name}' ({})",
                        db_config.safe_connection_string()
                    )
                })?,
        );
        let entry = CatalogEntry::new(
            db_config.description.clone().unwrap_or_default(),
            Arc::clone(&database) as Arc<dyn SchemaSource>,
        )
        .with_executor(database as Arc<dyn QueryExecutor>);
        catalog.register(name, entry);
    }
    info!(databases = catalog.len(), "catalog assembled");

    let generator = Arc::new(OpenAiSqlGenerator::new(&config.llm)?);
    let mut orchestrator =
        Orchestrator::new(Arc::clone(&config), catalog, generator).with_metrics(Arc::new(LogMetrics));

    // The selector only matters when a question could go to more than
    // one place.
    if config.databases.len() > 1 && config.auto_select {
        orchestrator = orchestrator.with_selector(Arc::new(LlmDatabaseSelector::new(&config.llm)?));
    }

    if config.validation.enabled {
        orchestrator = orchestrator.with_result_validator(Arc::new(LlmResultValidator::new(
            &config.llm,
            &config.validation,
        )?));
    }

    Ok(orchestrator)
}

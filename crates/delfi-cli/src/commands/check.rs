//! `delfi check` command implementation.
//!
//! Reports configuration problems without starting the gateway:
//! missing databases, an unknown default, settings that can never
//! work, and (with `--connect`) whether each database is reachable.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use delfi_adapter_pg::PgDatabase;
use delfi_core::GatewayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One problem found in the configuration.
#[derive(Debug, Clone)]
pub struct Finding {
    pub severity: Severity,
    /// Configuration section the finding belongs to.
    pub section: &'static str,
    pub message: String,
}

impl Finding {
    fn error(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            section,
            message: message.into(),
        }
    }

    fn warning(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            section,
            message: message.into(),
        }
    }
}

pub async fn run(config_path: &Path, connect: bool) -> Result<()> {
    let config = GatewayConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    println!("Checking configuration: {}", config_path.display());

    let findings = collect_findings(&config);
    for finding in &findings {
        let glyph = match finding.severity {
            Severity::Error => "✗",
            Severity::Warning => "⚠",
        };
        println!("  {} [{}] {}", glyph, finding.section, finding.message);
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    let warnings = findings.len() - errors;

    if findings.is_empty() {
        println!("✓ Configuration looks good.");
    } else {
        println!("Summary: {errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        anyhow::bail!("Configuration check failed with {errors} error(s)");
    }

    if connect {
        connect_all(&config).await?;
    }

    Ok(())
}

/// Offline configuration checks. Pure so tests can assert on the
/// findings directly.
pub fn collect_findings(config: &GatewayConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    if config.databases.is_empty() {
        findings.push(Finding::error(
            "databases",
            "No databases configured. The gateway cannot answer questions without at least one.",
        ));
    }

    if let Some(default) = &config.default_database {
        if !config.databases.contains_key(default) {
            findings.push(Finding::error(
                "databases",
                format!("default_database '{default}' is not a configured database"),
            ));
        }
    }

    for (name, db) in &config.databases {
        if let Some(env_var) = &db.credentials_env {
            if std::env::var(env_var).is_err() && db.password.is_none() {
                findings.push(Finding::warning(
                    "databases",
                    format!(
                        "Database '{name}': credentials_env '{env_var}' is not set and no password is configured"
                    ),
                ));
            }
        }
    }

    if config.databases.len() > 1 && config.default_database.is_none() && !config.auto_select {
        findings.push(Finding::warning(
            "databases",
            "Multiple databases with auto_select disabled and no default_database; \
             every request must name a database explicitly",
        ));
    }

    if config.llm.resolve_api_key().is_none() {
        findings.push(Finding::warning(
            "llm",
            format!(
                "OpenAI API key not found: set llm.api_key or the '{}' environment variable",
                config.llm.api_key_env
            ),
        ));
    }

    if config.security.allow_write_operations {
        findings.push(Finding::warning(
            "security",
            "allow_write_operations is enabled; data-modifying SQL will pass validation",
        ));
    }

    if config.execution.max_rows == 0 {
        findings.push(Finding::warning(
            "execution",
            "max_rows is 0; every result set will come back empty",
        ));
    }

    if config.resilience.rate_limit_enabled && config.resilience.max_concurrent_queries == 0 {
        findings.push(Finding::warning(
            "resilience",
            "rate limiting is enabled with max_concurrent_queries 0; every request will be rejected",
        ));
    }

    if config.validation.enabled && config.validation.confidence_threshold > 100 {
        findings.push(Finding::warning(
            "validation",
            format!(
                "confidence_threshold {} can never be met; scores cap at 100",
                config.validation.confidence_threshold
            ),
        ));
    }

    findings
}

/// Connect to each configured database in turn and report the outcome.
async fn connect_all(config: &GatewayConfig) -> Result<()> {
    let mut failures = 0;
    for (name, db_config) in &config.databases {
        match PgDatabase::connect(name, db_config, &config.execution).await {
            Ok(_) => println!("  ✓ {name}: connected ({})", db_config.safe_connection_string()),
            Err(err) => {
                failures += 1;
                // The error message already names the database.
                println!("  ✗ {}", err.message);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} database(s) unreachable");
    }
    println!("✓ All databases reachable.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(yaml: &str) -> GatewayConfig {
        GatewayConfig::from_yaml(yaml).unwrap()
    }

    fn messages(findings: &[Finding], severity: Severity) -> Vec<String> {
        findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| f.message.clone())
            .collect()
    }

    #[test]
    fn empty_config_reports_missing_databases() {
        let config = config_from("{}");
        let findings = collect_findings(&config);
        let errors = messages(&findings, Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("No databases configured"));
    }

    #[test]
    fn unknown_default_database_is_an_error() {
        let config = config_from(
            r#"
databases:
  sales:
    database: sales
default_database: warehouse
llm:
  api_key: test-key
"#,
        );
        let findings = collect_findings(&config);
        let errors = messages(&findings, Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'warehouse'"));
    }

    #[test]
    fn impossible_settings_are_warned_about() {
        let config = config_from(
            r#"
databases:
  sales:
    database: sales
llm:
  api_key: test-key
security:
  allow_write_operations: true
execution:
  max_rows: 0
validation:
  confidence_threshold: 150
resilience:
  rate_limit_enabled: true
  max_concurrent_queries: 0
"#,
        );
        let findings = collect_findings(&config);
        assert!(messages(&findings, Severity::Error).is_empty());
        let warnings = messages(&findings, Severity::Warning);
        assert!(warnings.iter().any(|m| m.contains("allow_write_operations")));
        assert!(warnings.iter().any(|m| m.contains("max_rows is 0")));
        assert!(warnings.iter().any(|m| m.contains("confidence_threshold 150")));
        assert!(warnings.iter().any(|m| m.contains("max_concurrent_queries 0")));
    }

    #[test]
    fn multi_database_without_routing_is_warned_about() {
        let config = config_from(
            r#"
databases:
  sales:
    database: sales
  support:
    database: support
auto_select: false
llm:
  api_key: test-key
"#,
        );
        let findings = collect_findings(&config);
        let warnings = messages(&findings, Severity::Warning);
        assert!(warnings.iter().any(|m| m.contains("auto_select disabled")));
    }

    #[test]
    fn clean_config_with_inline_key_has_no_findings() {
        let config = config_from(
            r#"
databases:
  sales:
    database: sales
    password: hunter2
default_database: sales
llm:
  api_key: test-key
"#,
        );
        assert!(collect_findings(&config).is_empty());
    }
}

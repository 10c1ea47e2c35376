//! Configuration types for the Delfi query gateway.
//!
//! Configuration is loaded from a single YAML file (delfi.yaml) and
//! shared by reference across the gateway crates. Secrets never live
//! inline: database credentials and the LLM API key can be pulled from
//! environment variables named in the file.

pub mod cache;
pub mod database;
pub mod execution;
pub mod llm;
pub mod resilience;
pub mod security;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use execution::ExecutionConfig;
pub use llm::LlmConfig;
pub use resilience::ResilienceConfig;
pub use security::SecurityConfig;
pub use validation::ValidationConfig;

/// Complete gateway configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Target databases keyed by logical name. Iteration order is the
    /// sorted key order, which makes "first database" fallbacks
    /// deterministic.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    /// Database used when a request names none and several are
    /// configured. Must match a key in `databases`.
    #[serde(default)]
    pub default_database: Option<String>,

    /// Whether the LLM selector may route questions when several
    /// databases are configured and no default applies.
    #[serde(default = "default_true")]
    pub auto_select: bool,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// SQL security policy.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Query execution limits.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Retry, circuit breaker, and rate limiting settings.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Schema cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Result validation settings.
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            project: None,
            databases: BTreeMap::new(),
            default_database: None,
            auto_select: true,
            llm: LlmConfig::default(),
            security: SecurityConfig::default(),
            execution: ExecutionConfig::default(),
            resilience: ResilienceConfig::default(),
            cache: CacheConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(default) = &self.default_database {
            if !self.databases.contains_key(default) {
                return Err(ConfigError::Config(format!(
                    "default_database '{default}' is not a configured database"
                )));
            }
        }
        Ok(())
    }

    /// Configured database names in sorted order.
    pub fn database_names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    /// Descriptions for the database selector, keyed by database name.
    /// Databases without a description get an empty string.
    pub fn database_descriptions(&self) -> BTreeMap<String, String> {
        self.databases
            .iter()
            .map(|(name, db)| (name.clone(), db.description.clone().unwrap_or_default()))
            .collect()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
project: analytics
databases:
  sales:
    database: sales
    username: reader
    description: "Orders, products, revenue"
  support:
    database: support
    credentials_env: SUPPORT_DATABASE_URL
default_database: sales
security:
  allow_explain: true
  blocked_tables: [secrets]
resilience:
  max_retries: 2
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.project.as_deref(), Some("analytics"));
        assert_eq!(
            config.database_names(),
            vec!["sales".to_string(), "support".to_string()]
        );
        assert_eq!(config.default_database.as_deref(), Some("sales"));
        assert!(config.auto_select);
        assert!(config.security.allow_explain);
        assert!(!config.security.allow_write_operations);
        assert_eq!(config.resilience.max_retries, 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.execution.max_rows, 10_000);
        assert_eq!(config.cache.schema_ttl_seconds, 3600);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_default_database() {
        let mut config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        config.default_database = Some("missing".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_descriptions_default_to_empty() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        let descriptions = config.database_descriptions();
        assert_eq!(descriptions["sales"], "Orders, products, revenue");
        assert_eq!(descriptions["support"], "");
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = GatewayConfig::from_yaml("databases: [not a map").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}

//! Schema cache configuration.

use serde::{Deserialize, Serialize};

/// Settings for the per-database schema cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether cached snapshots are reused at all. When disabled every
    /// lookup misses and triggers a fresh load.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds before a cached schema snapshot expires.
    #[serde(default = "default_schema_ttl")]
    pub schema_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schema_ttl_seconds: default_schema_ttl(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_schema_ttl() -> u64 {
    3600
}

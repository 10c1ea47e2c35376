//! Result validation configuration.

use serde::{Deserialize, Serialize};

/// Settings for the LLM-based result confidence check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Whether result validation runs at all. When disabled every
    /// result is accepted with confidence 100.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How many result rows to include in the validation prompt.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Timeout for the validation call in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Minimum confidence (0-100) for a result to count as acceptable.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rows: default_sample_rows(),
            timeout_seconds: default_timeout_seconds(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_sample_rows() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_confidence_threshold() -> u8 {
    70
}

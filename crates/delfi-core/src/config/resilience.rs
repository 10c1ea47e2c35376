//! Retry, circuit breaker, and rate limiting configuration.

use serde::{Deserialize, Serialize};

/// Fault-tolerance settings for the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Retries after a failed validation of generated SQL. The total
    /// number of generation attempts is `max_retries + 1`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive generation failures before the circuit opens.
    #[serde(default = "default_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Seconds the circuit stays open before allowing a probe request.
    #[serde(default = "default_breaker_timeout")]
    pub circuit_breaker_timeout_seconds: u64,

    /// Whether concurrency limits are enforced at all.
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,

    /// Maximum concurrent query executions.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Maximum concurrent LLM calls.
    #[serde(default = "default_max_concurrent_llm")]
    pub max_concurrent_llm: usize,

    /// Seconds to wait for a permit before failing with a rate limit
    /// error.
    #[serde(default = "default_rate_limit_timeout")]
    pub rate_limit_timeout_seconds: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            circuit_breaker_threshold: default_breaker_threshold(),
            circuit_breaker_timeout_seconds: default_breaker_timeout(),
            rate_limit_enabled: true,
            max_concurrent_queries: default_max_concurrent_queries(),
            max_concurrent_llm: default_max_concurrent_llm(),
            rate_limit_timeout_seconds: default_rate_limit_timeout(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_timeout() -> u64 {
    60
}

fn default_max_concurrent_queries() -> usize {
    10
}

fn default_max_concurrent_llm() -> usize {
    5
}

fn default_rate_limit_timeout() -> u64 {
    30
}

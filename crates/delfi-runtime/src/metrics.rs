//! Metrics seam.
//!
//! The orchestrator reports counters and latencies through this trait
//! and behaves identically whichever implementation is plugged in.
//! `NoopMetrics` is the default; `LogMetrics` emits each observation
//! as a debug event under the `delfi::metrics` target.

use tracing::debug;

/// Collector for the gateway's operational counters and histograms.
pub trait MetricsCollector: Send + Sync {
    /// Count one finished query request. `outcome` is one of
    /// "success", "error" or "rate_limited".
    fn increment_query_request(&self, outcome: &str, database: &str);

    /// Count one LLM call attempt for the given pipeline stage.
    fn increment_llm_call(&self, stage: &str);

    /// Count one generated statement rejected by validation.
    fn increment_sql_rejected(&self, reason: &str);

    /// Add tokens consumed by an LLM call.
    fn increment_llm_tokens(&self, stage: &str, tokens: u64);

    /// Observe end-to-end request duration in seconds.
    fn observe_query_duration(&self, seconds: f64);

    /// Observe one LLM round-trip in seconds.
    fn observe_llm_latency(&self, stage: &str, seconds: f64);

    /// Observe one database execution in seconds.
    fn observe_db_query_duration(&self, seconds: f64);
}

/// Discards every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {
    fn increment_query_request(&self, _outcome: &str, _database: &str) {}
    fn increment_llm_call(&self, _stage: &str) {}
    fn increment_sql_rejected(&self, _reason: &str) {}
    fn increment_llm_tokens(&self, _stage: &str, _tokens: u64) {}
    fn observe_query_duration(&self, _seconds: f64) {}
    fn observe_llm_latency(&self, _stage: &str, _seconds: f64) {}
    fn observe_db_query_duration(&self, _seconds: f64) {}
}

/// Emits every observation as a `delfi::metrics` debug event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetrics;

impl MetricsCollector for LogMetrics {
    fn increment_query_request(&self, outcome: &str, database: &str) {
        debug!(target: "delfi::metrics", outcome, database, "query_requests_total");
    }

    fn increment_llm_call(&self, stage: &str) {
        debug!(target: "delfi::metrics", stage, "llm_calls_total");
    }

    fn increment_sql_rejected(&self, reason: &str) {
        debug!(target: "delfi::metrics", reason, "sql_rejected_total");
    }

    fn increment_llm_tokens(&self, stage: &str, tokens: u64) {
        debug!(target: "delfi::metrics", stage, tokens, "llm_tokens_total");
    }

    fn observe_query_duration(&self, seconds: f64) {
        debug!(target: "delfi::metrics", seconds, "query_duration_seconds");
    }

    fn observe_llm_latency(&self, stage: &str, seconds: f64) {
        debug!(target: "delfi::metrics", stage, seconds, "llm_latency_seconds");
    }

    fn observe_db_query_duration(&self, seconds: f64) {
        debug!(target: "delfi::metrics", seconds, "db_query_duration_seconds");
    }
}

// Pipeline runtime for the Delfi query gateway: the orchestrator, the
// database catalog, the schema cache, and the trait seams adapters and
// LLM clients plug into.

pub mod adapter;
pub mod catalog;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod schema_cache;

pub use adapter::{ExecutionOutcome, QueryExecutor, SchemaSource};
pub use catalog::{Catalog, CatalogEntry};
pub use llm::{DatabaseSelector, GeneratedSql, ResultValidator, SqlGenerator};
pub use metrics::{LogMetrics, MetricsCollector, NoopMetrics};
pub use orchestrator::Orchestrator;
pub use schema_cache::SchemaCache;

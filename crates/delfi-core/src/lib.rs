// Shared types for the Delfi query gateway: configuration, the error
// taxonomy, and the domain models that cross crate boundaries.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types for convenience
pub use config::{
    CacheConfig,
    ConfigError,
    DatabaseConfig,
    ExecutionConfig,
    // Main config
    GatewayConfig,
    LlmConfig,
    ResilienceConfig,
    SecurityConfig,
    ValidationConfig,
};
pub use error::{ErrorKind, GatewayError};
pub use models::{
    ColumnInfo,
    DatabaseSchema,
    ErrorDetail,
    ForeignKeyInfo,
    // Query pipeline models
    QueryRequest,
    QueryResponse,
    QueryResult,
    RequestError,
    ResultValidationResult,
    ReturnType,
    SelectionResult,
    TableInfo,
    ValidationResult,
};

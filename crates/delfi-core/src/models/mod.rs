//! Domain models shared across the gateway crates.

pub mod query;
pub mod schema;

pub use query::{
    ErrorDetail, QueryRequest, QueryResponse, QueryResult, RequestError, ResultValidationResult,
    ReturnType, SelectionResult, ValidationResult, MAX_QUESTION_LEN,
};
pub use schema::{ColumnInfo, DatabaseSchema, ForeignKeyInfo, TableInfo};

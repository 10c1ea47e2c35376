//! Postgres adapter: connection pooling, schema introspection, and
//! bounded read-only query execution.

use std::time::Duration;

use async_trait::async_trait;
use delfi_core::{DatabaseConfig, ExecutionConfig, GatewayError, TableInfo};
use delfi_runtime::{ExecutionOutcome, QueryExecutor, SchemaSource};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use tracing::{debug, info};

pub mod introspect;

const MAX_POOL_CONNECTIONS: u32 = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One configured Postgres database behind a connection pool.
///
/// Implements both runtime seams: `SchemaSource` for introspection and
/// `QueryExecutor` for bounded execution.
pub struct PgDatabase {
    pool: PgPool,
    execution: ExecutionConfig,
}

impl PgDatabase {
    /// Connect a pool and verify the server is reachable.
    pub async fn connect(
        name: &str,
        config: &DatabaseConfig,
        execution: &ExecutionConfig,
    ) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_POOL_CONNECTIONS)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(&config.connection_string())
            .await
            .map_err(|e| {
                GatewayError::database(format!("Failed to connect to database '{name}': {e}"))
            })?;

        let (server_version,): (String,) = sqlx::query_as("select version()")
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                GatewayError::database(format!("Failed to connect to database '{name}': {e}"))
            })?;
        info!(database = name, server = %server_version, "connected to Postgres");

        Ok(Self {
            pool,
            execution: execution.clone(),
        })
    }

    /// Wrap an already-built pool; used by tests and custom wiring.
    pub fn from_pool(pool: PgPool, execution: ExecutionConfig) -> Self {
        Self { pool, execution }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SchemaSource for PgDatabase {
    async fn introspect(&self) -> Result<Vec<TableInfo>, GatewayError> {
        introspect::introspect_tables(&self.pool).await
    }
}

#[async_trait]
impl QueryExecutor for PgDatabase {
    /// Run validated SQL inside a read-only transaction with a
    /// server-side statement timeout, capping the returned rows.
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            GatewayError::database(format!("Failed to begin transaction: {e}"))
        })?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(session_setup_error)?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.execution.statement_timeout_ms()
        ))
        .execute(&mut *tx)
        .await
        .map_err(session_setup_error)?;
        sqlx::query(&format!(
            "SET LOCAL search_path = {}",
            self.execution.search_path
        ))
        .execute(&mut *tx)
        .await
        .map_err(session_setup_error)?;
        if let Some(role) = &self.execution.readonly_role {
            sqlx::query(&format!("SET LOCAL ROLE {role}"))
                .execute(&mut *tx)
                .await
                .map_err(session_setup_error)?;
        }

        let rows = sqlx::query(sql).fetch_all(&mut *tx).await.map_err(|e| {
            GatewayError::database(format!("Query execution failed: {e}"))
        })?;
        tx.commit().await.map_err(|e| {
            GatewayError::database(format!("Failed to commit transaction: {e}"))
        })?;

        let total_rows = rows.len();
        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows: Vec<serde_json::Value> = rows
            .iter()
            .take(self.execution.max_rows)
            .map(row_to_json)
            .collect();

        debug!(total_rows, returned = rows.len(), "query executed");
        Ok(ExecutionOutcome {
            columns,
            rows,
            total_rows,
        })
    }
}

fn session_setup_error(err: sqlx::Error) -> GatewayError {
    GatewayError::database(format!("Failed to prepare read-only session: {err}"))
}

/// Decode a row into a JSON object keyed by column name.
///
/// Postgres types have no uniform sqlx decoding, so each column walks
/// a try_get cascade from the common types to the exotic ones, ending
/// at null for anything undecodable.
fn row_to_json(row: &PgRow) -> serde_json::Value {
    use serde_json::{json, Value};

    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name();
        let value: Value = if let Ok(v) = row.try_get::<i64, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<i32, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<i16, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f64, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f32, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<bool, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<String, _>(name) {
            json!(v)
        } else if let Ok(v) = row.try_get::<uuid::Uuid, _>(name) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(name) {
            json!(v.to_rfc3339())
        } else if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(name) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(name) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(name) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<bigdecimal::BigDecimal, _>(name) {
            bigdecimal_to_json(v)
        } else if let Ok(v) = row.try_get::<serde_json::Value, _>(name) {
            v
        } else if let Ok(v) = row.try_get::<Option<String>, _>(name) {
            match v {
                Some(s) => json!(s),
                None => Value::Null,
            }
        } else {
            Value::Null
        };
        object.insert(name.to_string(), value);
    }
    serde_json::Value::Object(object)
}

/// Numerics render as JSON numbers when they fit in an f64, otherwise
/// as strings so no precision silently disappears.
fn bigdecimal_to_json(value: bigdecimal::BigDecimal) -> serde_json::Value {
    use bigdecimal::ToPrimitive;

    match value.to_f64() {
        Some(f) if f.is_finite() => serde_json::json!(f),
        _ => serde_json::json!(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::bigdecimal_to_json;

    #[test]
    fn test_small_numeric_becomes_json_number() {
        let value = BigDecimal::from_str("123.5").unwrap();
        assert_eq!(bigdecimal_to_json(value), json!(123.5));
    }

    #[test]
    fn test_huge_numeric_falls_back_to_string() {
        let digits = "9".repeat(400);
        let value = BigDecimal::from_str(&digits).unwrap();
        assert_eq!(bigdecimal_to_json(value), json!(digits));
    }
}

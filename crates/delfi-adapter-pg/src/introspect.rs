//! Schema introspection over `information_schema`.
//!
//! Produces the typed snapshot the rest of the gateway works with.
//! System schemas (`pg_catalog`, `information_schema`) are excluded,
//! and everything is ordered so repeated snapshots of an unchanged
//! database compare equal.

use std::collections::BTreeMap;

use delfi_core::{ColumnInfo, ForeignKeyInfo, GatewayError, TableInfo};
use sqlx::{PgPool, Row};

/// Snapshot every base table visible to the connected role.
pub async fn introspect_tables(pool: &PgPool) -> Result<Vec<TableInfo>, GatewayError> {
    let table_rows = sqlx::query(
        r#"
        select table_schema, table_name
        from information_schema.tables
        where table_type = 'BASE TABLE'
          and table_schema not in ('pg_catalog', 'information_schema')
        order by table_schema, table_name
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| GatewayError::database(format!("Failed to list tables: {e}")))?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let table_schema: String = row.get("table_schema");
        let table_name: String = row.get("table_name");

        let columns = introspect_columns(pool, &table_schema, &table_name).await?;
        let primary_key = introspect_primary_key(pool, &table_schema, &table_name).await?;
        let foreign_keys = introspect_foreign_keys(pool, &table_schema, &table_name).await?;

        tables.push(TableInfo {
            schema: table_schema,
            name: table_name,
            columns,
            primary_key,
            foreign_keys,
        });
    }
    Ok(tables)
}

async fn introspect_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>, GatewayError> {
    let rows = sqlx::query(
        r#"
        select column_name, data_type, is_nullable, column_default
        from information_schema.columns
        where table_schema = $1 and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        GatewayError::database(format!("Failed to read columns of {schema}.{table}: {e}"))
    })?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let is_nullable: String = row.get("is_nullable");
            ColumnInfo {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                nullable: is_nullable == "YES",
                default: row.get("column_default"),
            }
        })
        .collect())
}

async fn introspect_primary_key(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, GatewayError> {
    let rows = sqlx::query(
        r#"
        select kcu.column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        where tc.constraint_type = 'PRIMARY KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        order by kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        GatewayError::database(format!("Failed to read primary key of {schema}.{table}: {e}"))
    })?;

    Ok(rows
        .into_iter()
        .map(|row| row.get::<String, _>("column_name"))
        .collect())
}

async fn introspect_foreign_keys(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<ForeignKeyInfo>, GatewayError> {
    let rows = sqlx::query(
        r#"
        select
          tc.constraint_name,
          kcu.column_name as column_name,
          ccu.table_schema as foreign_table_schema,
          ccu.table_name as foreign_table_name,
          ccu.column_name as foreign_column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        join information_schema.constraint_column_usage ccu
          on ccu.constraint_name = tc.constraint_name
         and ccu.table_schema = tc.table_schema
        where tc.constraint_type = 'FOREIGN KEY'
          and tc.table_schema = $1
          and tc.table_name = $2
        order by tc.constraint_name, kcu.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        GatewayError::database(format!("Failed to read foreign keys of {schema}.{table}: {e}"))
    })?;

    // Grouped by constraint name so composite keys stay together.
    let mut grouped: BTreeMap<String, ForeignKeyInfo> = BTreeMap::new();
    for row in rows {
        let constraint: String = row.get("constraint_name");
        let column: String = row.get("column_name");
        let referenced_schema: String = row.get("foreign_table_schema");
        let referenced_table: String = row.get("foreign_table_name");
        let referenced_column: String = row.get("foreign_column_name");

        let entry = grouped
            .entry(constraint.clone())
            .or_insert_with(|| ForeignKeyInfo {
                constraint,
                columns: Vec::new(),
                referenced_schema,
                referenced_table,
                referenced_columns: Vec::new(),
            });
        entry.columns.push(column);
        entry.referenced_columns.push(referenced_column);
    }

    Ok(grouped.into_values().collect())
}

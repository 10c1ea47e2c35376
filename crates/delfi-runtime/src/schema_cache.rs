//! TTL cache of introspected database schemas.
//!
//! Snapshots are stored wholesale per database and shared behind an
//! `Arc`. `get` never blocks on I/O; a miss or an expired entry makes
//! the caller run `load`, which re-introspects and replaces the stored
//! snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use delfi_core::{CacheConfig, DatabaseSchema, GatewayError};
use tracing::{debug, info};

use crate::adapter::SchemaSource;

pub struct SchemaCache {
    enabled: bool,
    ttl: Duration,
    entries: RwLock<HashMap<String, Arc<DatabaseSchema>>>,
    /// Monotonic snapshot counter across all databases.
    version: AtomicU64,
}

impl SchemaCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.schema_ttl_seconds),
            entries: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Fetch a cached snapshot. Returns `None` when caching is
    /// disabled, the database was never loaded, or the entry has
    /// outlived the configured TTL.
    pub fn get(&self, database: &str) -> Option<Arc<DatabaseSchema>> {
        if !self.enabled {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let schema = entries.get(database)?;
        if schema.age_seconds() >= self.ttl.as_secs() as i64 {
            debug!(database, age_seconds = schema.age_seconds(), "schema cache entry expired");
            return None;
        }
        Some(Arc::clone(schema))
    }

    /// Introspect through `source` and store the fresh snapshot.
    ///
    /// The snapshot is returned even when caching is disabled; it just
    /// is not retained for later calls.
    pub async fn load(
        &self,
        database: &str,
        source: &dyn SchemaSource,
    ) -> Result<Arc<DatabaseSchema>, GatewayError> {
        let tables = source.introspect().await?;
        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let schema = Arc::new(DatabaseSchema::new(database, tables, version));
        info!(
            database,
            tables = schema.tables.len(),
            version,
            "loaded schema snapshot"
        );
        if self.enabled {
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(database.to_string(), Arc::clone(&schema));
        }
        Ok(schema)
    }

    /// Drop the cached snapshot for one database. Returns whether an
    /// entry was present.
    pub fn invalidate(&self, database: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(database)
            .is_some()
    }

    /// Number of snapshots currently held.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

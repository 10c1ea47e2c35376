//! Registry of configured databases and their adapters.
//!
//! Keys iterate in sorted order, so "first database" fallbacks and
//! error listings are deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::{QueryExecutor, SchemaSource};

/// One configured database: its description plus the adapters wired
/// for it. An entry without an executor can serve schema inspection
/// and SQL-only generation but cannot execute queries.
#[derive(Clone)]
pub struct CatalogEntry {
    pub description: String,
    pub schema_source: Arc<dyn SchemaSource>,
    pub executor: Option<Arc<dyn QueryExecutor>>,
}

impl CatalogEntry {
    pub fn new(description: impl Into<String>, schema_source: Arc<dyn SchemaSource>) -> Self {
        Self {
            description: description.into(),
            schema_source,
            executor: None,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }
}

#[derive(Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, entry: CatalogEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Database names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// First database name in sorted order.
    pub fn first_name(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    /// Name to description map handed to the database selector.
    pub fn descriptions(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.description.clone()))
            .collect()
    }
}

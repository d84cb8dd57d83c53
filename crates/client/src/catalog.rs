//! In-memory table registry backing the embedded engine.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;
use veq_common::{Result, VeqError};
use veq_planner::SchemaProvider;

/// A named, immutable in-memory table.
#[derive(Debug, Clone)]
pub struct MemTable {
    pub name: String,
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl MemTable {
    /// Create a table, rejecting batches whose schema disagrees.
    pub fn try_new(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Self> {
        let name = name.into();
        for (i, batch) in batches.iter().enumerate() {
            if batch.schema() != schema {
                return Err(VeqError::InvalidConfig(format!(
                    "batch {i} schema does not match table schema for '{name}'"
                )));
            }
        }
        Ok(Self {
            name,
            schema,
            batches,
        })
    }
}

/// Table registry for a session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, MemTable>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a table under its own name.
    pub fn register_table(&mut self, table: MemTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Result<&MemTable> {
        self.tables
            .get(name)
            .ok_or_else(|| VeqError::Planning(format!("unknown table: {name}")))
    }

    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}

impl SchemaProvider for Catalog {
    fn table_schema(&self, table: &str) -> Result<SchemaRef> {
        Ok(self.get(table)?.schema.clone())
    }
}

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;
use veq_common::{EngineConfig, Result};

use crate::catalog::MemTable;
use crate::session::{Session, SharedSession};
use crate::DataFrame;

/// Entry point for the embedded engine.
#[derive(Clone)]
pub struct Engine {
    session: SharedSession,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let session = Arc::new(Session::new(config)?);
        Ok(Self { session })
    }

    /// Register an in-memory table under a given name.
    ///
    /// Batches must all carry `schema`; registering again under the same name
    /// replaces the table.
    pub fn register_table(
        &self,
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<()> {
        let table = MemTable::try_new(name, schema, batches)?;
        self.session
            .catalog
            .write()
            .expect("catalog lock poisoned")
            .register_table(table);
        Ok(())
    }

    /// Lazy handle over a registered table.
    ///
    /// Table existence is checked at analysis time, not here.
    pub fn table(&self, name: &str) -> Result<DataFrame> {
        Ok(DataFrame::table(self.session.clone(), name))
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.session
            .catalog
            .read()
            .expect("catalog lock poisoned")
            .tables()
    }

    pub fn table_schema(&self, name: &str) -> Result<SchemaRef> {
        let cat = self.session.catalog.read().expect("catalog lock poisoned");
        Ok(cat.get(name)?.schema.clone())
    }

    pub fn prometheus_metrics(&self) -> String {
        self.session.metrics.render_prometheus()
    }
}

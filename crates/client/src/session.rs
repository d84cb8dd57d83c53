use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use veq_common::{EngineConfig, MetricsRegistry, QueryId, Result};
use veq_planner::Analyzer;

use crate::catalog::Catalog;
use crate::runtime::{EmbeddedRuntime, Runtime};

pub type SharedSession = Arc<Session>;

#[derive(Debug)]
pub struct Session {
    pub config: EngineConfig,
    pub catalog: RwLock<Catalog>,
    pub metrics: MetricsRegistry,
    pub analyzer: Analyzer,
    pub runtime: Arc<dyn Runtime>,
    next_query_id: AtomicU64,
}

impl Session {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            config,
            catalog: RwLock::new(Catalog::new()),
            metrics: MetricsRegistry::new(),
            analyzer: Analyzer::new(),
            runtime: Arc::new(EmbeddedRuntime::new()),
            next_query_id: AtomicU64::new(1),
        })
    }

    /// Hand out the next query id for metric/trace labeling.
    pub fn next_query_id(&self) -> QueryId {
        QueryId(self.next_query_id.fetch_add(1, Ordering::Relaxed))
    }
}

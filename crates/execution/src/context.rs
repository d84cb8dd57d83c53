//! Per-query execution context shared by operators.

use std::sync::Arc;

use veq_common::{MetricsRegistry, QueryId};

/// Execution-time context handed to every operator of a query.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Query this task belongs to; used as metric/trace label.
    pub query_id: QueryId,

    /// Target batch size for operators that coalesce/split.
    pub batch_size_rows: usize,

    /// Soft memory budget for spill decisions later (v1+).
    pub mem_budget_bytes: usize,

    /// Session metrics sink.
    pub metrics: MetricsRegistry,
}

/// Shared handle operators clone into their streams.
pub type SharedTaskContext = Arc<TaskContext>;

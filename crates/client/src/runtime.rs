use std::fmt::Debug;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use veq_common::{Result, VeqError};
use veq_execution::{
    ExecNode, FilterExec, LimitExec, MemScanExec, ProjectionExec, SendableRecordBatchStream,
    TaskContext,
};
use veq_planner::LogicalPlan;

use crate::catalog::Catalog;

/// Runtime = something that can execute an analyzed LogicalPlan and return a
/// stream of RecordBatches.
pub trait Runtime: Send + Sync + Debug {
    fn execute(
        &self,
        plan: LogicalPlan,
        ctx: TaskContext,
        catalog: Arc<Catalog>,
    ) -> BoxFuture<'static, Result<SendableRecordBatchStream>>;
}

/// In-process runtime walking the analyzed plan into an operator tree.
#[derive(Debug, Default)]
pub struct EmbeddedRuntime;

impl EmbeddedRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl Runtime for EmbeddedRuntime {
    fn execute(
        &self,
        plan: LogicalPlan,
        ctx: TaskContext,
        catalog: Arc<Catalog>,
    ) -> BoxFuture<'static, Result<SendableRecordBatchStream>> {
        async move {
            tracing::debug!(query_id = %ctx.query_id, "building operator tree");
            let root = build_exec(&plan, catalog.as_ref())?;
            root.execute(Arc::new(ctx))
        }
        .boxed()
    }
}

fn build_exec(plan: &LogicalPlan, catalog: &Catalog) -> Result<Arc<dyn ExecNode>> {
    match plan {
        LogicalPlan::TableScan { table } => {
            let t = catalog.get(table)?;
            Ok(Arc::new(MemScanExec::new(t.schema.clone(), t.batches.clone())))
        }
        LogicalPlan::Projection { exprs, input } => {
            let child = build_exec(input, catalog)?;
            Ok(Arc::new(ProjectionExec::try_new(child, exprs)?))
        }
        LogicalPlan::Filter { predicate, input } => {
            let child = build_exec(input, catalog)?;
            Ok(Arc::new(FilterExec::try_new(child, predicate)?))
        }
        LogicalPlan::Limit { n, input } => {
            let child = build_exec(input, catalog)?;
            Ok(Arc::new(LimitExec::new(child, *n)))
        }
        LogicalPlan::WithColumn { .. } => Err(VeqError::Planning(
            "with_column plans must be analyzed before execution".to_string(),
        )),
    }
}

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;
use futures::TryStreamExt;
use veq_execution::TaskContext;
use veq_planner::{explain_logical, Expr, LogicalPlan};

use veq_common::Result;

use crate::session::SharedSession;

/// Lazy, immutable view over a logical plan.
///
/// Every combinator consumes `self` and returns a new DataFrame; nothing is
/// evaluated (or even validated) until [`DataFrame::collect`] runs the plan.
#[derive(Debug, Clone)]
pub struct DataFrame {
    session: SharedSession,
    logical_plan: LogicalPlan,
}

impl DataFrame {
    pub(crate) fn new(session: SharedSession, logical_plan: LogicalPlan) -> Self {
        Self {
            session,
            logical_plan,
        }
    }

    pub fn logical_plan(&self) -> &LogicalPlan {
        &self.logical_plan
    }

    /// ctx.table("t") -> TableScan
    pub fn table(session: SharedSession, table: &str) -> Self {
        let plan = LogicalPlan::TableScan {
            table: table.to_string(),
        };
        Self::new(session, plan)
    }

    /// df.select(vec![(expr, "name"), ...])
    pub fn select(self, exprs: Vec<(Expr, String)>) -> Self {
        let plan = LogicalPlan::Projection {
            exprs,
            input: Box::new(self.logical_plan),
        };
        Self::new(self.session, plan)
    }

    /// df.filter(expr)
    pub fn filter(self, predicate: Expr) -> Self {
        let plan = LogicalPlan::Filter {
            predicate,
            input: Box::new(self.logical_plan),
        };
        Self::new(self.session, plan)
    }

    /// df.with_column("name", expr)
    ///
    /// Appends one derived column; every input column is retained, row count
    /// and order unchanged.
    pub fn with_column(self, name: impl Into<String>, expr: Expr) -> Self {
        let plan = LogicalPlan::WithColumn {
            name: name.into(),
            expr,
            input: Box::new(self.logical_plan),
        };
        Self::new(self.session, plan)
    }

    /// df.limit(n)
    pub fn limit(self, n: usize) -> Self {
        let plan = LogicalPlan::Limit {
            n,
            input: Box::new(self.logical_plan),
        };
        Self::new(self.session, plan)
    }

    /// Render the (unanalyzed) logical plan as multiline text.
    pub fn explain(&self) -> String {
        explain_logical(&self.logical_plan)
    }

    /// Output schema of this plan, computed by the analyzer.
    pub fn schema(&self) -> Result<SchemaRef> {
        let catalog = self.session.catalog.read().expect("catalog lock poisoned");
        let (_, schema) = self
            .session
            .analyzer
            .analyze_with_schema(self.logical_plan.clone(), &*catalog)?;
        Ok(schema)
    }

    /// df.collect() (async)
    pub async fn collect(&self) -> Result<Vec<RecordBatch>> {
        // Snapshot the catalog so registered tables stay stable for the
        // lifetime of this query.
        let catalog = Arc::new(
            self.session
                .catalog
                .read()
                .expect("catalog lock poisoned")
                .clone(),
        );
        let analyzed = self
            .session
            .analyzer
            .analyze(self.logical_plan.clone(), catalog.as_ref())?;

        let ctx = TaskContext {
            query_id: self.session.next_query_id(),
            batch_size_rows: self.session.config.batch_size_rows,
            mem_budget_bytes: self.session.config.mem_budget_bytes,
            metrics: self.session.metrics.clone(),
        };

        let stream = self.session.runtime.execute(analyzed, ctx, catalog).await?;
        let batches: Vec<RecordBatch> = stream.try_collect().await?;
        Ok(batches)
    }
}

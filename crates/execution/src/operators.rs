//! Physical operators for the embedded runtime.
//!
//! Every operator records rows/batches/time into the session metrics
//! registry under its own name.

use std::sync::Arc;
use std::time::Instant;

use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema, SchemaRef};
use futures::StreamExt;
use veq_common::{Result, VeqError};
use veq_planner::Expr;

use crate::context::SharedTaskContext;
use crate::exec_node::ExecNode;
use crate::expressions::{PhysicalExpr, compile_expr};
use crate::stream::{SendableRecordBatchStream, StreamAdapter};

/// Streams registered in-memory batches, re-chunked to the configured batch size.
pub struct MemScanExec {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl MemScanExec {
    /// Create a scan over pre-registered batches.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }
}

impl ExecNode for MemScanExec {
    fn name(&self) -> &'static str {
        "MemScan"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn execute(&self, ctx: SharedTaskContext) -> Result<SendableRecordBatchStream> {
        let target = ctx.batch_size_rows.max(1);
        let start = Instant::now();
        let mut chunks: Vec<Result<RecordBatch>> = Vec::new();
        for batch in &self.batches {
            let mut offset = 0;
            while offset < batch.num_rows() {
                let len = target.min(batch.num_rows() - offset);
                chunks.push(Ok(batch.slice(offset, len)));
                offset += len;
            }
            if batch.num_rows() == 0 {
                chunks.push(Ok(batch.clone()));
            }
        }
        let secs = start.elapsed().as_secs_f64();
        for chunk in chunks.iter().flatten() {
            ctx.metrics
                .record_operator(ctx.query_id, self.name(), chunk.num_rows() as u64, secs);
        }
        tracing::debug!(
            query_id = %ctx.query_id,
            batches = chunks.len(),
            "memory scan start"
        );
        Ok(Box::pin(StreamAdapter::new(
            self.schema.clone(),
            futures::stream::iter(chunks),
        )))
    }
}

/// Evaluates a list of expressions per batch, producing a new batch per input batch.
pub struct ProjectionExec {
    input: Arc<dyn ExecNode>,
    exprs: Vec<(Arc<dyn PhysicalExpr>, String)>,
    schema: SchemaRef,
}

impl ProjectionExec {
    /// Compile `exprs` against the input's schema.
    pub fn try_new(input: Arc<dyn ExecNode>, exprs: &[(Expr, String)]) -> Result<Self> {
        let input_schema = input.schema();
        let mut compiled = Vec::with_capacity(exprs.len());
        let mut fields = Vec::with_capacity(exprs.len());
        for (e, name) in exprs {
            let pe = compile_expr(e, &input_schema)?;
            fields.push(Field::new(name.clone(), pe.data_type(), true));
            compiled.push((pe, name.clone()));
        }
        Ok(Self {
            input,
            exprs: compiled,
            schema: Arc::new(Schema::new(fields)),
        })
    }
}

impl ExecNode for ProjectionExec {
    fn name(&self) -> &'static str {
        "Projection"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn execute(&self, ctx: SharedTaskContext) -> Result<SendableRecordBatchStream> {
        let input = self.input.execute(ctx.clone())?;
        let schema = self.schema.clone();
        let exprs = self.exprs.clone();
        let name = self.name();

        let mapped = input.map(move |batch| {
            let batch = batch?;
            let start = Instant::now();
            let columns = exprs
                .iter()
                .map(|(e, _)| e.evaluate(&batch))
                .collect::<Result<Vec<_>>>()?;
            let out = RecordBatch::try_new(schema.clone(), columns)
                .map_err(|e| VeqError::Execution(format!("projection build failed: {e}")))?;
            ctx.metrics.record_operator(
                ctx.query_id,
                name,
                out.num_rows() as u64,
                start.elapsed().as_secs_f64(),
            );
            Ok(out)
        });
        Ok(Box::pin(StreamAdapter::new(self.schema.clone(), mapped)))
    }
}

/// Keeps the rows for which the predicate evaluates to `true`.
pub struct FilterExec {
    input: Arc<dyn ExecNode>,
    predicate: Arc<dyn PhysicalExpr>,
}

impl FilterExec {
    /// Compile `predicate` against the input's schema.
    pub fn try_new(input: Arc<dyn ExecNode>, predicate: &Expr) -> Result<Self> {
        let compiled = compile_expr(predicate, &input.schema())?;
        Ok(Self {
            input,
            predicate: compiled,
        })
    }
}

impl ExecNode for FilterExec {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn schema(&self) -> SchemaRef {
        self.input.schema()
    }

    fn execute(&self, ctx: SharedTaskContext) -> Result<SendableRecordBatchStream> {
        let input = self.input.execute(ctx.clone())?;
        let predicate = self.predicate.clone();
        let name = self.name();

        let mapped = input.map(move |batch| {
            let batch = batch?;
            let start = Instant::now();
            let mask = predicate.evaluate(&batch)?;
            let mask = mask
                .as_any()
                .downcast_ref::<arrow::array::BooleanArray>()
                .ok_or_else(|| {
                    VeqError::Execution("filter predicate must evaluate to boolean".to_string())
                })?;
            let out = filter_record_batch(&batch, mask)
                .map_err(|e| VeqError::Execution(format!("filter kernel failed: {e}")))?;
            ctx.metrics.record_operator(
                ctx.query_id,
                name,
                out.num_rows() as u64,
                start.elapsed().as_secs_f64(),
            );
            Ok(out)
        });
        Ok(Box::pin(StreamAdapter::new(self.input.schema(), mapped)))
    }
}

/// Truncates the stream after `n` rows.
pub struct LimitExec {
    input: Arc<dyn ExecNode>,
    n: usize,
}

impl LimitExec {
    /// Create a limit over `input`.
    pub fn new(input: Arc<dyn ExecNode>, n: usize) -> Self {
        Self { input, n }
    }
}

impl ExecNode for LimitExec {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn schema(&self) -> SchemaRef {
        self.input.schema()
    }

    fn execute(&self, ctx: SharedTaskContext) -> Result<SendableRecordBatchStream> {
        let input = self.input.execute(ctx.clone())?;
        let name = self.name();

        let limited = input.scan(self.n, move |remaining, batch| {
            let item = match batch {
                Err(e) => Some(Err(e)),
                Ok(b) => {
                    if *remaining == 0 {
                        None
                    } else {
                        let out = if b.num_rows() <= *remaining {
                            *remaining -= b.num_rows();
                            b
                        } else {
                            let sliced = b.slice(0, *remaining);
                            *remaining = 0;
                            sliced
                        };
                        ctx.metrics
                            .record_operator(ctx.query_id, name, out.num_rows() as u64, 0.0);
                        Some(Ok(out))
                    }
                }
            };
            futures::future::ready(item)
        });
        Ok(Box::pin(StreamAdapter::new(self.input.schema(), limited)))
    }
}

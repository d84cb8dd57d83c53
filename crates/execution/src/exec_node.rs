//! Physical operator contract.

use arrow_schema::SchemaRef;
use veq_common::Result;

use crate::context::SharedTaskContext;
use crate::stream::SendableRecordBatchStream;

/// A physical operator instance that can produce RecordBatches.
/// Operators are pull-based (consumer polls the stream).
pub trait ExecNode: Send + Sync {
    /// Stable operator name used as metric/trace label.
    fn name(&self) -> &'static str;

    /// Output schema of every batch this operator yields.
    fn schema(&self) -> SchemaRef;

    /// Start execution, returning the operator's output stream.
    fn execute(&self, ctx: SharedTaskContext) -> Result<SendableRecordBatchStream>;
}

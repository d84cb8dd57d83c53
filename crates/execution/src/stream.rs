//! Record-batch stream abstractions.

use std::pin::Pin;
use std::task::{Context, Poll};

use arrow::record_batch::RecordBatch;
use arrow_schema::SchemaRef;
use futures::Stream;
use veq_common::Result;

/// A stream of RecordBatches that also knows its output schema.
pub trait RecordBatchStream: Stream<Item = Result<RecordBatch>> + Send {
    /// Output schema for every batch yielded by this stream.
    fn schema(&self) -> SchemaRef;
}

/// The standard "stream you can return from operators".
pub type SendableRecordBatchStream = Pin<Box<dyn RecordBatchStream>>;

/// Adapter that attaches a schema to any `Stream<Item = Result<RecordBatch>>`.
pub struct StreamAdapter<S> {
    schema: SchemaRef,
    inner: S,
}

impl<S> StreamAdapter<S> {
    /// Create a new schema-attached stream adapter.
    pub fn new(schema: SchemaRef, inner: S) -> Self {
        Self { schema, inner }
    }
}

impl<S> RecordBatchStream for StreamAdapter<S>
where
    S: Stream<Item = Result<RecordBatch>> + Send + Unpin + 'static,
{
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl<S> Stream for StreamAdapter<S>
where
    S: Stream<Item = Result<RecordBatch>> + Unpin,
{
    type Item = Result<RecordBatch>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

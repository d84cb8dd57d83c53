#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Float64Array, Float64Builder, Int64Builder, ListBuilder};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use veq_client::{DataFrame, Engine};
use veq_common::EngineConfig;

/// Row shape for the vectors fixture: id plus two nullable embedding arrays.
pub type VecRow = (i64, Option<Vec<f64>>, Option<Vec<f64>>);

pub fn vectors_schema() -> SchemaRef {
    let item = || Arc::new(Field::new("item", DataType::Float64, true));
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("a", DataType::List(item()), true),
        Field::new("b", DataType::List(item()), true),
    ]))
}

pub fn vectors_batch(rows: &[VecRow]) -> RecordBatch {
    let mut ids = Int64Builder::new();
    let mut a = ListBuilder::new(Float64Builder::new());
    let mut b = ListBuilder::new(Float64Builder::new());
    for (id, av, bv) in rows {
        ids.append_value(*id);
        match av {
            Some(v) => {
                for x in v {
                    a.values().append_value(*x);
                }
                a.append(true);
            }
            None => a.append_null(),
        }
        match bv {
            Some(v) => {
                for x in v {
                    b.values().append_value(*x);
                }
                b.append(true);
            }
            None => b.append_null(),
        }
    }
    RecordBatch::try_new(
        vectors_schema(),
        vec![
            Arc::new(ids.finish()),
            Arc::new(a.finish()),
            Arc::new(b.finish()),
        ],
    )
    .expect("batch")
}

pub fn engine_with_vectors(table: &str, rows: &[VecRow]) -> Engine {
    let engine = Engine::new(EngineConfig::default()).expect("engine");
    engine
        .register_table(table, vectors_schema(), vec![vectors_batch(rows)])
        .expect("register");
    engine
}

pub fn collect(df: &DataFrame) -> Vec<RecordBatch> {
    futures::executor::block_on(df.collect()).expect("collect")
}

/// Single-batch convenience for small fixtures.
pub fn collect_one(df: &DataFrame) -> RecordBatch {
    let batches = collect(df);
    assert_eq!(batches.len(), 1, "expected a single batch");
    batches.into_iter().next().expect("batch")
}

pub fn f64_column(batch: &RecordBatch, name: &str) -> Float64Array {
    use arrow::array::Array;

    let idx = batch.schema().index_of(name).expect("column");
    let col = batch.column(idx);
    col.as_any()
        .downcast_ref::<Float64Array>()
        .expect("float64 column")
        .clone()
}

/// Straightforward reference implementations the engine output is checked
/// against, within relative tolerance.
pub fn reference_cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}

pub fn reference_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn assert_close(got: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (got - expected).abs() <= tolerance,
        "expected {expected}, got {got}"
    );
}

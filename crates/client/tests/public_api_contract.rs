mod support;

use veq_client::{col, cosine_similarity, lit_f64, mul, Engine};
use veq_common::EngineConfig;

use support::{collect_one, vectors_batch, vectors_schema};

#[test]
fn public_api_engine_and_dataframe_contract_v1() {
    let engine = Engine::new(EngineConfig::default()).expect("engine");
    engine
        .register_table(
            "api_contract_docs",
            vectors_schema(),
            vec![vectors_batch(&[(
                1,
                Some(vec![1.0, 0.0]),
                Some(vec![1.0, 0.0]),
            )])],
        )
        .expect("register");

    assert_eq!(engine.list_tables(), vec!["api_contract_docs".to_string()]);
    let schema = engine.table_schema("api_contract_docs").expect("schema");
    assert_eq!(schema.fields().len(), 3);

    // Lazy handle, combinators, similarity helper, explain, collect.
    let df = engine.table("api_contract_docs").expect("table");
    let df = cosine_similarity(df, "a", "b").with_column("double", mul(col("cosine"), lit_f64(2.0)));
    assert!(df.explain().contains("WithColumn"));

    let batch = collect_one(&df);
    assert_eq!(batch.num_columns(), 5);

    // Metrics surface renders prometheus text.
    assert!(engine
        .prometheus_metrics()
        .contains("veq_operator_rows_out_total"));
}

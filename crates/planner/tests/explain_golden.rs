use veq_planner::{explain_logical, BinaryOp, Expr, LiteralValue, LogicalPlan};

fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

fn f64_lit(v: f64) -> Expr {
    Expr::Literal(LiteralValue::Float64(v))
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn pair_field(var: &str, name: &str) -> Expr {
    Expr::Field {
        input: Box::new(Expr::BoundVar(var.to_string())),
        name: name.to_string(),
    }
}

#[test]
fn dot_product_expression_renders_in_expression_language() {
    let dot = Expr::Aggregate {
        input: Box::new(Expr::ArraysZip {
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        }),
        seed: Box::new(f64_lit(0.0)),
        acc: "acc".to_string(),
        param: "x".to_string(),
        body: Box::new(binary(
            Expr::BoundVar("acc".to_string()),
            BinaryOp::Plus,
            binary(
                pair_field("x", "left"),
                BinaryOp::Multiply,
                pair_field("x", "right"),
            ),
        )),
    };

    assert_eq!(
        dot.to_string(),
        "aggregate(arrays_zip(a, b), 0.0, (acc, x) -> (acc + (x.left * x.right)))"
    );
}

#[test]
fn euclidean_expression_renders_in_expression_language() {
    let diff = Expr::Transform {
        input: Box::new(Expr::ArraysZip {
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        }),
        param: "x".to_string(),
        body: Box::new(binary(
            pair_field("x", "left"),
            BinaryOp::Minus,
            pair_field("x", "right"),
        )),
    };
    let sq_sum = Expr::Aggregate {
        input: Box::new(diff),
        seed: Box::new(f64_lit(0.0)),
        acc: "acc".to_string(),
        param: "x".to_string(),
        body: Box::new(binary(
            Expr::BoundVar("acc".to_string()),
            BinaryOp::Plus,
            binary(
                Expr::BoundVar("x".to_string()),
                BinaryOp::Multiply,
                Expr::BoundVar("x".to_string()),
            ),
        )),
    };
    let euclidean = Expr::Sqrt(Box::new(sq_sum));

    assert_eq!(
        euclidean.to_string(),
        "sqrt(aggregate(transform(arrays_zip(a, b), x -> (x.left - x.right)), 0.0, \
         (acc, x) -> (acc + (x * x))))"
    );
}

#[test]
fn explain_renders_plan_tree_with_expressions() {
    let plan = LogicalPlan::Limit {
        n: 10,
        input: Box::new(LogicalPlan::WithColumn {
            name: "norm".to_string(),
            expr: Expr::Sqrt(Box::new(Expr::Aggregate {
                input: Box::new(col("a")),
                seed: Box::new(f64_lit(0.0)),
                acc: "acc".to_string(),
                param: "x".to_string(),
                body: Box::new(binary(
                    Expr::BoundVar("acc".to_string()),
                    BinaryOp::Plus,
                    binary(
                        Expr::BoundVar("x".to_string()),
                        BinaryOp::Multiply,
                        Expr::BoundVar("x".to_string()),
                    ),
                )),
            })),
            input: Box::new(LogicalPlan::Filter {
                predicate: binary(col("id"), BinaryOp::Gt, Expr::Literal(LiteralValue::Int64(0))),
                input: Box::new(LogicalPlan::TableScan {
                    table: "items".to_string(),
                }),
            }),
        }),
    };

    let rendered = explain_logical(&plan);
    let expected = "\
Limit n=10
  WithColumn norm := sqrt(aggregate(a, 0.0, (acc, x) -> (acc + (x * x))))
    Filter (id > 0)
      TableScan table=items
";
    assert_eq!(rendered, expected);
}

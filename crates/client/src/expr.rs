use veq_planner::{BinaryOp, Expr, LiteralValue};

/// Builds a column-reference expression.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// Builds an `Int64` literal expression.
pub fn lit_i64(v: i64) -> Expr {
    Expr::Literal(LiteralValue::Int64(v))
}

/// Builds a `Float64` literal expression.
pub fn lit_f64(v: f64) -> Expr {
    Expr::Literal(LiteralValue::Float64(v))
}

/// Builds a boolean literal expression.
pub fn lit_bool(v: bool) -> Expr {
    Expr::Literal(LiteralValue::Boolean(v))
}

/// Builds a UTF-8 string literal expression.
pub fn lit_str(v: &str) -> Expr {
    Expr::Literal(LiteralValue::Utf8(v.to_string()))
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Builds an equality expression (`left = right`).
pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Eq, right)
}

/// Builds a less-than comparison.
pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Lt, right)
}

/// Builds a greater-than comparison.
pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Gt, right)
}

/// Builds an addition expression.
pub fn add(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Plus, right)
}

/// Builds a subtraction expression.
pub fn sub(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Minus, right)
}

/// Builds a multiplication expression.
pub fn mul(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Multiply, right)
}

/// Builds a division expression (IEEE semantics on floats).
pub fn div(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOp::Divide, right)
}

/// Builds a square-root expression.
pub fn sqrt(e: Expr) -> Expr {
    Expr::Sqrt(Box::new(e))
}

/// References a lambda parameter inside transform/aggregate bodies.
pub fn var(name: &str) -> Expr {
    Expr::BoundVar(name.to_string())
}

/// Accesses a struct field, e.g. the `left`/`right` sides of a zipped pair.
pub fn field(input: Expr, name: &str) -> Expr {
    Expr::Field {
        input: Box::new(input),
        name: name.to_string(),
    }
}

/// Pairs elements of two equal-length `List<Float64>` columns by index.
pub fn arrays_zip(left: Expr, right: Expr) -> Expr {
    Expr::ArraysZip {
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Maps `body` over every element of a list; `param` names the element.
pub fn transform(input: Expr, param: &str, body: Expr) -> Expr {
    Expr::Transform {
        input: Box::new(input),
        param: param.to_string(),
        body: Box::new(body),
    }
}

/// Left-folds a list with `seed`; `acc`/`param` name the accumulator and element.
pub fn aggregate(input: Expr, seed: Expr, acc: &str, param: &str, body: Expr) -> Expr {
    Expr::Aggregate {
        input: Box::new(input),
        seed: Box::new(seed),
        acc: acc.to_string(),
        param: param.to_string(),
        body: Box::new(body),
    }
}

/// Converts a fixed-dimension vector column into a `List<Float64>` column.
pub fn vector_to_array(e: Expr) -> Expr {
    Expr::VectorToArray(Box::new(e))
}

use std::fmt;

use arrow_schema::DataType;
use serde::{Deserialize, Serialize};

/// Row expression evaluated by the execution engine.
///
/// The array sublanguage (`ArraysZip`, `Transform`, `Aggregate`) operates on
/// list-valued columns: zip pairs two equal-length lists element-wise,
/// transform maps a lambda over a list, and aggregate is a strict left fold
/// with an explicit seed. Lambda bodies reference their parameters through
/// [`Expr::BoundVar`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Unresolved column reference by name.
    Column(String),
    /// Analyzer-resolved column reference.
    ColumnRef { name: String, index: usize },
    Literal(LiteralValue),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        to_type: DataType,
    },
    /// Square root over a `Float64` operand.
    Sqrt(Box<Expr>),
    /// Lambda parameter reference; valid only inside transform/aggregate bodies.
    BoundVar(String),
    /// Struct-field access, used to read the sides of a zipped pair.
    Field { input: Box<Expr>, name: String },
    /// Pairs elements of two equal-length `List<Float64>` columns by index.
    ///
    /// Output element type is `Struct{left: Float64, right: Float64}`. Rows
    /// where the two lists differ in length fail at evaluation time.
    ArraysZip { left: Box<Expr>, right: Box<Expr> },
    /// Element-wise map over a list; order and length preserved.
    Transform {
        input: Box<Expr>,
        param: String,
        body: Box<Expr>,
    },
    /// Strict left fold over a list in index order.
    ///
    /// `body` is evaluated with `acc` bound to the running value (seeded from
    /// `seed`) and `param` bound to the current element; the result type is
    /// the seed type. An empty list yields the seed.
    Aggregate {
        input: Box<Expr>,
        seed: Box<Expr>,
        acc: String,
        param: String,
        body: Box<Expr>,
    },
    /// Converts a fixed-dimension vector column (`FixedSizeList` of floats)
    /// into a `List<Float64>` so it can feed the array sublanguage.
    VectorToArray(Box<Expr>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOp {
    /// Textual operator symbol used by expression rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int64(v) => write!(f, "{v}"),
            LiteralValue::Float64(v) => write!(f, "{v:?}"),
            LiteralValue::Utf8(v) => write!(f, "'{v}'"),
            LiteralValue::Boolean(v) => write!(f, "{v}"),
            LiteralValue::Null => write!(f, "NULL"),
        }
    }
}

/// Renders the expression in the engine's textual expression language, e.g.
/// `aggregate(arrays_zip(a, b), 0.0, (acc, x) -> (acc + (x.left * x.right)))`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{name}"),
            Expr::ColumnRef { name, .. } => write!(f, "{name}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::BinaryOp { left, op, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expr::Cast { expr, to_type } => write!(f, "cast({expr} as {to_type})"),
            Expr::Sqrt(e) => write!(f, "sqrt({e})"),
            Expr::BoundVar(name) => write!(f, "{name}"),
            Expr::Field { input, name } => write!(f, "{input}.{name}"),
            Expr::ArraysZip { left, right } => write!(f, "arrays_zip({left}, {right})"),
            Expr::Transform { input, param, body } => {
                write!(f, "transform({input}, {param} -> {body})")
            }
            Expr::Aggregate {
                input,
                seed,
                acc,
                param,
                body,
            } => write!(f, "aggregate({input}, {seed}, ({acc}, {param}) -> {body})"),
            Expr::VectorToArray(e) => write!(f, "vector_to_array({e})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogicalPlan {
    TableScan {
        table: String,
    },
    Projection {
        exprs: Vec<(Expr, String)>,
        input: Box<LogicalPlan>,
    },
    Filter {
        predicate: Expr,
        input: Box<LogicalPlan>,
    },
    /// Appends one derived column to the input, keeping every input column.
    ///
    /// The analyzer expands this into a full [`LogicalPlan::Projection`].
    WithColumn {
        name: String,
        expr: Expr,
        input: Box<LogicalPlan>,
    },
    Limit {
        n: usize,
        input: Box<LogicalPlan>,
    },
}

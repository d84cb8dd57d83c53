//! Expression compilation and evaluation for execution operators.
//!
//! Input contract:
//! - analyzer has resolved/typed expressions (primarily `ColumnRef`);
//! - execution may still accept unresolved `Column` as a compatibility fallback.
//!
//! Output contract:
//! - each evaluation returns an `ArrayRef` aligned to input batch row count.
//!
//! Numeric semantics are IEEE-754: Float64 division never errors, so a
//! zero-denominator quotient surfaces as infinity or NaN in the result column.
//! Nulls propagate: a null row or null operand yields a null output value.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, FixedSizeListArray, Float32Array, Float64Array,
    Float64Builder, Int64Array, Int64Builder, ListArray, ListBuilder, StringArray, StringBuilder,
    StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::compute::kernels::{
    cast::cast,
    cmp::{eq, gt, gt_eq, lt, lt_eq, neq},
    numeric::{add, div, mul, sub},
};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use veq_common::{Result, VeqError};

use veq_planner::{zip_pair_type, BinaryOp, Expr, LiteralValue};

/// Executable expression for the execution engine.
///
/// The planner/analyzer produces `Expr` trees; execution compiles them into
/// `PhysicalExpr` and evaluates batch-wise against Arrow arrays.
pub trait PhysicalExpr: Send + Sync {
    /// Static output data type of this expression.
    fn data_type(&self) -> DataType;
    /// Evaluate the expression for every row in `batch`.
    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef>;
}

/// Compile a planner Expr into a runnable expression.
///
/// Analysis should already have run, so columns are mostly `ColumnRef`;
/// lambda bodies are compiled against a synthetic single-field schema whose
/// field carries the bound parameter's name.
pub fn compile_expr(expr: &Expr, input_schema: &SchemaRef) -> Result<Arc<dyn PhysicalExpr>> {
    match expr {
        Expr::ColumnRef { index, .. } => {
            let dt = input_schema.field(*index).data_type().clone();
            Ok(Arc::new(ColumnExpr { index: *index, dt }))
        }
        Expr::Column(name) => {
            // Fallback while iterating: analyzer should resolve to ColumnRef eventually.
            let idx = input_schema
                .fields()
                .iter()
                .position(|f| f.name() == name)
                .ok_or_else(|| {
                    VeqError::Planning(format!("unknown column in execution: {name}"))
                })?;
            let dt = input_schema.field(idx).data_type().clone();
            Ok(Arc::new(ColumnExpr { index: idx, dt }))
        }

        Expr::BoundVar(name) => {
            // Only ever valid inside a lambda schema, where the parameter is
            // materialized as the single field.
            let idx = input_schema
                .fields()
                .iter()
                .position(|f| f.name() == name)
                .ok_or_else(|| {
                    VeqError::Execution(format!("bound variable '{name}' outside lambda body"))
                })?;
            let dt = input_schema.field(idx).data_type().clone();
            Ok(Arc::new(ColumnExpr { index: idx, dt }))
        }

        Expr::Literal(v) => Ok(Arc::new(LiteralExpr {
            v: v.clone(),
            dt: literal_type(v),
        })),

        Expr::Cast { expr, to_type } => {
            let inner = compile_expr(expr, input_schema)?;
            Ok(Arc::new(CastExpr {
                inner,
                to_type: to_type.clone(),
            }))
        }

        Expr::BinaryOp { left, op, right } => {
            let l = compile_expr(left, input_schema)?;
            let r = compile_expr(right, input_schema)?;
            let out = binary_out_type(*op, l.data_type(), r.data_type())?;

            Ok(Arc::new(BinaryExpr {
                left: l,
                right: r,
                op: *op,
                out,
            }))
        }

        Expr::Sqrt(e) => {
            let inner = compile_expr(e, input_schema)?;
            Ok(Arc::new(SqrtExpr { inner }))
        }

        Expr::Field { input, name } => {
            let inner = compile_expr(input, input_schema)?;
            let DataType::Struct(fields) = inner.data_type() else {
                return Err(VeqError::Execution(format!(
                    "field access '.{name}' expects a struct input"
                )));
            };
            let dt = fields
                .iter()
                .find(|f| f.name() == name)
                .map(|f| f.data_type().clone())
                .ok_or_else(|| VeqError::Execution(format!("unknown struct field: {name}")))?;
            Ok(Arc::new(FieldExpr {
                inner,
                name: name.clone(),
                dt,
            }))
        }

        Expr::ArraysZip { left, right } => {
            let l = compile_expr(left, input_schema)?;
            let r = compile_expr(right, input_schema)?;
            Ok(Arc::new(ZipExpr { left: l, right: r }))
        }

        Expr::Transform { input, param, body } => {
            let inner = compile_expr(input, input_schema)?;
            let elem = list_element_type(&inner.data_type())?;
            let lambda_schema = Arc::new(Schema::new(vec![Field::new(param.clone(), elem, true)]));
            let compiled_body = compile_expr(body, &lambda_schema)?;
            Ok(Arc::new(TransformExpr {
                input: inner,
                body: compiled_body,
                lambda_schema,
            }))
        }

        Expr::Aggregate {
            input,
            seed,
            acc,
            param,
            body,
        } => {
            let inner = compile_expr(input, input_schema)?;
            let seed = compile_expr(seed, input_schema)?;
            let out = seed.data_type();
            if out != DataType::Float64 {
                return Err(VeqError::Unsupported(format!(
                    "aggregate accumulator type {out} is not supported in v1"
                )));
            }
            Ok(Arc::new(AggregateExpr {
                input: inner,
                seed,
                acc: acc.clone(),
                param: param.clone(),
                body: (**body).clone(),
            }))
        }

        Expr::VectorToArray(e) => {
            let inner = compile_expr(e, input_schema)?;
            Ok(Arc::new(VectorToArrayExpr { inner }))
        }
    }
}

// =====================
// Standard expressions
// =====================

struct ColumnExpr {
    index: usize,
    dt: DataType,
}

impl PhysicalExpr for ColumnExpr {
    fn data_type(&self) -> DataType {
        self.dt.clone()
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        Ok(batch.column(self.index).clone())
    }
}

struct LiteralExpr {
    v: LiteralValue,
    dt: DataType,
}

impl PhysicalExpr for LiteralExpr {
    fn data_type(&self) -> DataType {
        self.dt.clone()
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        scalar_to_array(&self.v, batch.num_rows())
    }
}

struct CastExpr {
    inner: Arc<dyn PhysicalExpr>,
    to_type: DataType,
}

impl PhysicalExpr for CastExpr {
    fn data_type(&self) -> DataType {
        self.to_type.clone()
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.inner.evaluate(batch)?;
        cast(&arr, &self.to_type).map_err(|e| VeqError::Execution(format!("cast failed: {e}")))
    }
}

struct BinaryExpr {
    left: Arc<dyn PhysicalExpr>,
    right: Arc<dyn PhysicalExpr>,
    op: BinaryOp,
    out: DataType,
}

impl PhysicalExpr for BinaryExpr {
    fn data_type(&self) -> DataType {
        self.out.clone()
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let l = self.left.evaluate(batch)?;
        let r = self.right.evaluate(batch)?;

        match self.op {
            // arithmetic
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                eval_arith(self.op, &l, &r, &self.out)
            }
            // comparisons
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => eval_cmp(self.op, &l, &r),
        }
    }
}

struct SqrtExpr {
    inner: Arc<dyn PhysicalExpr>,
}

impl PhysicalExpr for SqrtExpr {
    fn data_type(&self) -> DataType {
        DataType::Float64
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.inner.evaluate(batch)?;
        let a = arr
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| VeqError::Execution("sqrt expects Float64 input".to_string()))?;
        let out = a.unary::<_, Float64Type>(f64::sqrt);
        Ok(Arc::new(out))
    }
}

struct FieldExpr {
    inner: Arc<dyn PhysicalExpr>,
    name: String,
    dt: DataType,
}

impl PhysicalExpr for FieldExpr {
    fn data_type(&self) -> DataType {
        self.dt.clone()
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.inner.evaluate(batch)?;
        let s = arr
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| {
                VeqError::Execution(format!("field access '.{}' expects a struct", self.name))
            })?;
        s.column_by_name(&self.name)
            .cloned()
            .ok_or_else(|| VeqError::Execution(format!("unknown struct field: {}", self.name)))
    }
}

// =====================
// Array sublanguage
// =====================

struct ZipExpr {
    left: Arc<dyn PhysicalExpr>,
    right: Arc<dyn PhysicalExpr>,
}

impl PhysicalExpr for ZipExpr {
    fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", zip_pair_type(), true)))
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let l = self.left.evaluate(batch)?;
        let r = self.right.evaluate(batch)?;
        let l = as_float_list(&l, "arrays_zip")?;
        let r = as_float_list(&r, "arrays_zip")?;

        let rows = l.len();
        let mut left_vals = Float64Builder::new();
        let mut right_vals = Float64Builder::new();
        let mut offsets: Vec<i32> = Vec::with_capacity(rows + 1);
        let mut validity: Vec<bool> = Vec::with_capacity(rows);
        offsets.push(0);
        let mut end: i32 = 0;

        for row in 0..rows {
            if l.is_null(row) || r.is_null(row) {
                validity.push(false);
                offsets.push(end);
                continue;
            }
            let lv = l.value(row);
            let rv = r.value(row);
            let lv = lv
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    VeqError::Execution("arrays_zip elements must be Float64".to_string())
                })?;
            let rv = rv
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    VeqError::Execution("arrays_zip elements must be Float64".to_string())
                })?;
            if lv.len() != rv.len() {
                return Err(VeqError::Execution(format!(
                    "arrays_zip length mismatch at row {row}: {} vs {}",
                    lv.len(),
                    rv.len()
                )));
            }
            for j in 0..lv.len() {
                if lv.is_null(j) {
                    left_vals.append_null();
                } else {
                    left_vals.append_value(lv.value(j));
                }
                if rv.is_null(j) {
                    right_vals.append_null();
                } else {
                    right_vals.append_value(rv.value(j));
                }
            }
            end += lv.len() as i32;
            offsets.push(end);
            validity.push(true);
        }

        let DataType::Struct(pair_fields) = zip_pair_type() else {
            unreachable!("zip pair type is a struct");
        };
        let pairs = StructArray::try_new(
            pair_fields,
            vec![
                Arc::new(left_vals.finish()) as ArrayRef,
                Arc::new(right_vals.finish()) as ArrayRef,
            ],
            None,
        )
        .map_err(|e| VeqError::Execution(format!("arrays_zip build failed: {e}")))?;

        let out = ListArray::try_new(
            Arc::new(Field::new("item", zip_pair_type(), true)),
            OffsetBuffer::new(offsets.into()),
            Arc::new(pairs),
            Some(NullBuffer::from(validity)),
        )
        .map_err(|e| VeqError::Execution(format!("arrays_zip build failed: {e}")))?;
        Ok(Arc::new(out))
    }
}

struct TransformExpr {
    input: Arc<dyn PhysicalExpr>,
    body: Arc<dyn PhysicalExpr>,
    lambda_schema: SchemaRef,
}

impl PhysicalExpr for TransformExpr {
    fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", self.body.data_type(), true)))
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.input.evaluate(batch)?;
        let list = arr
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| VeqError::Execution("transform expects a list input".to_string()))?;

        // Vectorized lambda: bind the parameter to the flattened values array,
        // evaluate the body once over every element, then re-wrap with the
        // input's offsets and row validity.
        let elem_batch =
            RecordBatch::try_new(self.lambda_schema.clone(), vec![list.values().clone()])
                .map_err(|e| VeqError::Execution(format!("transform bind failed: {e}")))?;
        let transformed = self.body.evaluate(&elem_batch)?;

        let out = ListArray::try_new(
            Arc::new(Field::new("item", self.body.data_type(), true)),
            list.offsets().clone(),
            transformed,
            list.nulls().cloned(),
        )
        .map_err(|e| VeqError::Execution(format!("transform build failed: {e}")))?;
        Ok(Arc::new(out))
    }
}

struct AggregateExpr {
    input: Arc<dyn PhysicalExpr>,
    seed: Arc<dyn PhysicalExpr>,
    acc: String,
    param: String,
    body: Expr,
}

/// Element view over a list's flattened values, downcast once per batch.
enum ElemValues<'a> {
    F64(&'a Float64Array),
    Pair {
        left: &'a Float64Array,
        right: &'a Float64Array,
    },
}

impl PhysicalExpr for AggregateExpr {
    fn data_type(&self) -> DataType {
        DataType::Float64
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.input.evaluate(batch)?;
        let list = arr
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| VeqError::Execution("aggregate expects a list input".to_string()))?;

        let seed_arr = self.seed.evaluate(batch)?;
        let seeds = seed_arr
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                VeqError::Execution("aggregate seed must evaluate to Float64".to_string())
            })?;

        let values = list.values();
        let elems = match values.data_type() {
            DataType::Float64 => ElemValues::F64(
                values
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| {
                        VeqError::Execution("aggregate values downcast failed".to_string())
                    })?,
            ),
            DataType::Struct(_) => {
                let s = values
                    .as_any()
                    .downcast_ref::<StructArray>()
                    .ok_or_else(|| {
                        VeqError::Execution("aggregate values downcast failed".to_string())
                    })?;
                let left = pair_side(s, "left")?;
                let right = pair_side(s, "right")?;
                ElemValues::Pair { left, right }
            }
            other => {
                return Err(VeqError::Execution(format!(
                    "aggregate does not support list elements of type {other}"
                )));
            }
        };

        let offsets = list.offsets();
        let mut out = Float64Builder::with_capacity(list.len());

        for row in 0..list.len() {
            if list.is_null(row) || seeds.is_null(row) {
                out.append_null();
                continue;
            }

            let start = offsets[row] as usize;
            let end = offsets[row + 1] as usize;
            let mut acc = ScalarValue::Float64(Some(seeds.value(row)));

            for j in start..end {
                let elem = match &elems {
                    ElemValues::F64(a) => ScalarValue::Float64(if a.is_null(j) {
                        None
                    } else {
                        Some(a.value(j))
                    }),
                    ElemValues::Pair { left, right } => ScalarValue::Pair {
                        left: if left.is_null(j) {
                            None
                        } else {
                            Some(left.value(j))
                        },
                        right: if right.is_null(j) {
                            None
                        } else {
                            Some(right.value(j))
                        },
                    },
                };
                let env = FoldEnv {
                    acc_name: &self.acc,
                    acc,
                    param_name: &self.param,
                    param: elem,
                };
                acc = eval_scalar(&self.body, &env)?;
            }

            match acc {
                ScalarValue::Float64(Some(v)) => out.append_value(v),
                ScalarValue::Float64(None) => out.append_null(),
                other => {
                    return Err(VeqError::Execution(format!(
                        "aggregate accumulator ended as non-scalar value {other:?}"
                    )));
                }
            }
        }

        Ok(Arc::new(out.finish()))
    }
}

struct VectorToArrayExpr {
    inner: Arc<dyn PhysicalExpr>,
}

impl PhysicalExpr for VectorToArrayExpr {
    fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<ArrayRef> {
        let arr = self.inner.evaluate(batch)?;
        let fsl = arr
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| {
                VeqError::Execution("vector_to_array expects a FixedSizeList input".to_string())
            })?;

        let mut b = ListBuilder::new(Float64Builder::new());
        for row in 0..fsl.len() {
            if fsl.is_null(row) {
                b.append_null();
                continue;
            }
            let v = fsl.value(row);
            match v.data_type() {
                DataType::Float32 => {
                    let v = v
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .ok_or_else(|| {
                            VeqError::Execution("vector values downcast failed".to_string())
                        })?;
                    for j in 0..v.len() {
                        if v.is_null(j) {
                            b.values().append_null();
                        } else {
                            b.values().append_value(v.value(j) as f64);
                        }
                    }
                }
                DataType::Float64 => {
                    let v = v
                        .as_any()
                        .downcast_ref::<Float64Array>()
                        .ok_or_else(|| {
                            VeqError::Execution("vector values downcast failed".to_string())
                        })?;
                    for j in 0..v.len() {
                        if v.is_null(j) {
                            b.values().append_null();
                        } else {
                            b.values().append_value(v.value(j));
                        }
                    }
                }
                other => {
                    return Err(VeqError::Execution(format!(
                        "vector_to_array expects float vectors, got {other}"
                    )));
                }
            }
            b.append(true);
        }
        Ok(Arc::new(b.finish()))
    }
}

// =====================
// Scalar fold interpreter
// =====================

/// Scalar value flowing through a fold body evaluation.
#[derive(Clone, Copy, Debug)]
enum ScalarValue {
    Float64(Option<f64>),
    Int64(Option<i64>),
    Pair {
        left: Option<f64>,
        right: Option<f64>,
    },
}

struct FoldEnv<'a> {
    acc_name: &'a str,
    acc: ScalarValue,
    param_name: &'a str,
    param: ScalarValue,
}

impl FoldEnv<'_> {
    fn lookup(&self, name: &str) -> Option<ScalarValue> {
        if name == self.acc_name {
            Some(self.acc)
        } else if name == self.param_name {
            Some(self.param)
        } else {
            None
        }
    }
}

fn eval_scalar(expr: &Expr, env: &FoldEnv<'_>) -> Result<ScalarValue> {
    match expr {
        Expr::BoundVar(name) => env.lookup(name).ok_or_else(|| {
            VeqError::Execution(format!("unbound lambda parameter in fold body: {name}"))
        }),

        Expr::Literal(LiteralValue::Float64(v)) => Ok(ScalarValue::Float64(Some(*v))),
        Expr::Literal(LiteralValue::Int64(v)) => Ok(ScalarValue::Int64(Some(*v))),

        Expr::Field { input, name } => {
            let v = eval_scalar(input, env)?;
            let ScalarValue::Pair { left, right } = v else {
                return Err(VeqError::Execution(format!(
                    "field access '.{name}' in fold body expects a zipped pair"
                )));
            };
            match name.as_str() {
                "left" => Ok(ScalarValue::Float64(left)),
                "right" => Ok(ScalarValue::Float64(right)),
                other => Err(VeqError::Execution(format!(
                    "unknown pair field in fold body: {other}"
                ))),
            }
        }

        Expr::Cast { expr, to_type } => {
            let v = eval_scalar(expr, env)?;
            match (v, to_type) {
                (ScalarValue::Int64(v), DataType::Float64) => {
                    Ok(ScalarValue::Float64(v.map(|x| x as f64)))
                }
                (v @ ScalarValue::Float64(_), DataType::Float64) => Ok(v),
                (_, other) => Err(VeqError::Unsupported(format!(
                    "cast to {other} in fold body is not supported in v1"
                ))),
            }
        }

        Expr::Sqrt(e) => {
            let v = eval_scalar(e, env)?;
            let ScalarValue::Float64(v) = v else {
                return Err(VeqError::Execution(
                    "sqrt in fold body expects Float64".to_string(),
                ));
            };
            Ok(ScalarValue::Float64(v.map(f64::sqrt)))
        }

        Expr::BinaryOp { left, op, right } => {
            let l = eval_scalar(left, env)?;
            let r = eval_scalar(right, env)?;
            scalar_arith(*op, l, r)
        }

        other => Err(VeqError::Unsupported(format!(
            "expression not supported in fold body: {other}"
        ))),
    }
}

fn scalar_arith(op: BinaryOp, l: ScalarValue, r: ScalarValue) -> Result<ScalarValue> {
    match (l, r) {
        (ScalarValue::Float64(l), ScalarValue::Float64(r)) => {
            let v = match (l, r) {
                (Some(l), Some(r)) => Some(match op {
                    BinaryOp::Plus => l + r,
                    BinaryOp::Minus => l - r,
                    BinaryOp::Multiply => l * r,
                    // IEEE division: 0/0 is NaN, x/0 is infinite.
                    BinaryOp::Divide => l / r,
                    _ => {
                        return Err(VeqError::Unsupported(
                            "comparisons in fold bodies are not supported in v1".to_string(),
                        ));
                    }
                }),
                _ => None,
            };
            Ok(ScalarValue::Float64(v))
        }
        (ScalarValue::Int64(l), ScalarValue::Int64(r)) => {
            let v = match (l, r) {
                (Some(l), Some(r)) => {
                    let out = match op {
                        BinaryOp::Plus => l.checked_add(r),
                        BinaryOp::Minus => l.checked_sub(r),
                        BinaryOp::Multiply => l.checked_mul(r),
                        BinaryOp::Divide => l.checked_div(r),
                        _ => {
                            return Err(VeqError::Unsupported(
                                "comparisons in fold bodies are not supported in v1".to_string(),
                            ));
                        }
                    };
                    Some(out.ok_or_else(|| {
                        VeqError::Execution("integer arithmetic overflow in fold body".to_string())
                    })?)
                }
                _ => None,
            };
            Ok(ScalarValue::Int64(v))
        }
        (l, r) => Err(VeqError::Execution(format!(
            "fold body operand type mismatch: {l:?} vs {r:?}"
        ))),
    }
}

// ------------------ helpers ------------------

fn literal_type(v: &LiteralValue) -> DataType {
    match v {
        LiteralValue::Int64(_) => DataType::Int64,
        LiteralValue::Float64(_) => DataType::Float64,
        LiteralValue::Utf8(_) => DataType::Utf8,
        LiteralValue::Boolean(_) => DataType::Boolean,
        LiteralValue::Null => DataType::Null,
    }
}

fn scalar_to_array(v: &LiteralValue, len: usize) -> Result<ArrayRef> {
    match v {
        LiteralValue::Int64(x) => {
            let mut b = Int64Builder::with_capacity(len);
            for _ in 0..len {
                b.append_value(*x);
            }
            Ok(Arc::new(b.finish()))
        }
        LiteralValue::Float64(x) => {
            let mut b = Float64Builder::with_capacity(len);
            for _ in 0..len {
                b.append_value(*x);
            }
            Ok(Arc::new(b.finish()))
        }
        LiteralValue::Boolean(x) => {
            let mut b = BooleanBuilder::with_capacity(len);
            for _ in 0..len {
                b.append_value(*x);
            }
            Ok(Arc::new(b.finish()))
        }
        LiteralValue::Utf8(s) => {
            let mut b = StringBuilder::with_capacity(len, s.len() * len);
            for _ in 0..len {
                b.append_value(s);
            }
            Ok(Arc::new(b.finish()))
        }
        LiteralValue::Null => Ok(arrow::array::new_null_array(&DataType::Null, len)),
    }
}

fn binary_out_type(op: BinaryOp, l: DataType, r: DataType) -> Result<DataType> {
    match op {
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => Ok(DataType::Boolean),

        BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
            if l != r {
                return Err(VeqError::Planning(format!(
                    "execution expects casts inserted by analyzer; got {l:?} vs {r:?}"
                )));
            }
            Ok(l)
        }
    }
}

fn eval_arith(op: BinaryOp, l: &ArrayRef, r: &ArrayRef, out: &DataType) -> Result<ArrayRef> {
    match out {
        DataType::Int64 => {
            let la = l
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| VeqError::Execution("expected Int64 array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| VeqError::Execution("expected Int64 array".to_string()))?;

            let res = match op {
                BinaryOp::Plus => add(la, ra),
                BinaryOp::Minus => sub(la, ra),
                BinaryOp::Multiply => mul(la, ra),
                BinaryOp::Divide => div(la, ra),
                _ => unreachable!(),
            }
            .map_err(|e| VeqError::Execution(format!("arith kernel failed: {e}")))?;

            Ok(res)
        }

        DataType::Float64 => {
            let la = l
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| VeqError::Execution("expected Float64 array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| VeqError::Execution("expected Float64 array".to_string()))?;

            let res = match op {
                BinaryOp::Plus => add(la, ra),
                BinaryOp::Minus => sub(la, ra),
                BinaryOp::Multiply => mul(la, ra),
                BinaryOp::Divide => div(la, ra),
                _ => unreachable!(),
            }
            .map_err(|e| VeqError::Execution(format!("arith kernel failed: {e}")))?;

            Ok(res)
        }

        _ => Err(VeqError::Unsupported(format!(
            "arith not supported for type {out:?} in v1"
        ))),
    }
}

fn eval_cmp(op: BinaryOp, l: &ArrayRef, r: &ArrayRef) -> Result<ArrayRef> {
    fn run<T: arrow::array::Datum>(op: BinaryOp, la: &T, ra: &T) -> Result<ArrayRef> {
        let res = match op {
            BinaryOp::Eq => eq(la, ra),
            BinaryOp::NotEq => neq(la, ra),
            BinaryOp::Lt => lt(la, ra),
            BinaryOp::LtEq => lt_eq(la, ra),
            BinaryOp::Gt => gt(la, ra),
            BinaryOp::GtEq => gt_eq(la, ra),
            _ => unreachable!(),
        }
        .map_err(|e| VeqError::Execution(format!("cmp kernel failed: {e}")))?;
        Ok(Arc::new(res))
    }

    match l.data_type() {
        DataType::Int64 => {
            let la = l
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| VeqError::Execution("expected Int64 array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| VeqError::Execution("expected Int64 array".to_string()))?;
            run(op, la, ra)
        }
        DataType::Float64 => {
            let la = l
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| VeqError::Execution("expected Float64 array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| VeqError::Execution("expected Float64 array".to_string()))?;
            run(op, la, ra)
        }
        DataType::Utf8 => {
            let la = l
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| VeqError::Execution("expected Utf8 array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| VeqError::Execution("expected Utf8 array".to_string()))?;
            run(op, la, ra)
        }
        DataType::Boolean => {
            let la = l
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| VeqError::Execution("expected Boolean array".to_string()))?;
            let ra = r
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| VeqError::Execution("expected Boolean array".to_string()))?;
            match op {
                BinaryOp::Eq | BinaryOp::NotEq => run(op, la, ra),
                _ => Err(VeqError::Unsupported(
                    "ordering comparisons not supported for boolean in v1".to_string(),
                )),
            }
        }
        other => Err(VeqError::Unsupported(format!(
            "comparison not supported for {other:?} in v1"
        ))),
    }
}

fn as_float_list<'a>(arr: &'a ArrayRef, op: &str) -> Result<&'a ListArray> {
    let list = arr.as_any().downcast_ref::<ListArray>().ok_or_else(|| {
        VeqError::Execution(format!("{op} expects List<Float64> input, got {}", arr.data_type()))
    })?;
    if list.values().data_type() != &DataType::Float64 {
        return Err(VeqError::Execution(format!(
            "{op} expects List<Float64> input, got {}",
            arr.data_type()
        )));
    }
    Ok(list)
}

fn pair_side<'a>(s: &'a StructArray, name: &str) -> Result<&'a Float64Array> {
    s.column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| {
            VeqError::Execution(format!("zipped pair is missing Float64 field '{name}'"))
        })
}

fn list_element_type(t: &DataType) -> Result<DataType> {
    match t {
        DataType::List(field) => Ok(field.data_type().clone()),
        other => Err(VeqError::Execution(format!(
            "expected a list expression, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, Float64Array, Float64Builder, ListBuilder};
    use arrow::record_batch::RecordBatch;
    use arrow_schema::{DataType, Field, Schema};

    use super::compile_expr;
    use veq_planner::{BinaryOp, Expr, LiteralValue};

    fn list_field(name: &str) -> Field {
        Field::new(
            name,
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            true,
        )
    }

    /// Batch with two list columns `a` and `b`; `None` rows are null lists.
    fn list_batch(rows: &[Option<(Vec<f64>, Vec<f64>)>]) -> RecordBatch {
        let mut a = ListBuilder::new(Float64Builder::new());
        let mut b = ListBuilder::new(Float64Builder::new());
        for row in rows {
            match row {
                Some((av, bv)) => {
                    for x in av {
                        a.values().append_value(*x);
                    }
                    a.append(true);
                    for x in bv {
                        b.values().append_value(*x);
                    }
                    b.append(true);
                }
                None => {
                    a.append_null();
                    b.append_null();
                }
            }
        }
        let schema = Arc::new(Schema::new(vec![list_field("a"), list_field("b")]));
        RecordBatch::try_new(schema, vec![Arc::new(a.finish()), Arc::new(b.finish())])
            .expect("batch")
    }

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

    fn zip_ab() -> Expr {
        Expr::ArraysZip {
            left: Box::new(col("a")),
            right: Box::new(col("b")),
        }
    }

    fn dot_product() -> Expr {
        Expr::Aggregate {
            input: Box::new(zip_ab()),
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
        }
    }

    fn sum_of_squares(input: Expr) -> Expr {
        Expr::Aggregate {
            input: Box::new(input),
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
        }
    }

    fn eval_f64(expr: Expr, batch: &RecordBatch) -> Float64Array {
        let compiled = compile_expr(&expr, batch.schema_ref()).expect("compile");
        let out = compiled.evaluate(batch).expect("evaluate");
        out.as_any()
            .downcast_ref::<Float64Array>()
            .expect("float64 out")
            .clone()
    }

    #[test]
    fn fold_computes_dot_product_per_row() {
        let batch = list_batch(&[
            Some((vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0])),
            Some((vec![1.0, 0.0], vec![0.0, 1.0])),
        ]);
        let out = eval_f64(dot_product(), &batch);
        assert!((out.value(0) - 32.0).abs() < 1e-12);
        assert!((out.value(1) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn fold_of_empty_list_yields_seed() {
        let batch = list_batch(&[Some((vec![], vec![]))]);
        let out = eval_f64(dot_product(), &batch);
        assert_eq!(out.value(0), 0.0);
        assert!(!out.is_null(0));
    }

    #[test]
    fn fold_of_null_row_yields_null() {
        let batch = list_batch(&[None, Some((vec![1.0], vec![2.0]))]);
        let out = eval_f64(dot_product(), &batch);
        assert!(out.is_null(0));
        assert!((out.value(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zip_length_mismatch_is_execution_error() {
        let batch = list_batch(&[Some((vec![1.0, 2.0], vec![1.0]))]);
        let compiled = compile_expr(&dot_product(), batch.schema_ref()).expect("compile");
        let err = compiled.evaluate(&batch).expect_err("mismatch");
        let msg = err.to_string();
        assert!(
            msg.contains("arrays_zip length mismatch at row 0: 2 vs 1"),
            "unexpected error: {msg}"
        );
    }

    #[test]
    fn transform_maps_pair_difference() {
        let batch = list_batch(&[Some((vec![3.0, 5.0], vec![1.0, 1.0]))]);
        let diff = Expr::Transform {
            input: Box::new(zip_ab()),
            param: "x".to_string(),
            body: Box::new(binary(
                pair_field("x", "left"),
                BinaryOp::Minus,
                pair_field("x", "right"),
            )),
        };
        // Fold the differences to observe them through a scalar output.
        let total = Expr::Aggregate {
            input: Box::new(diff),
            seed: Box::new(f64_lit(0.0)),
            acc: "acc".to_string(),
            param: "x".to_string(),
            body: Box::new(binary(
                Expr::BoundVar("acc".to_string()),
                BinaryOp::Plus,
                Expr::BoundVar("x".to_string()),
            )),
        };
        let out = eval_f64(total, &batch);
        assert!((out.value(0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn sqrt_of_sum_of_squares_is_norm() {
        let batch = list_batch(&[Some((vec![3.0, 4.0], vec![0.0, 0.0]))]);
        let norm = Expr::Sqrt(Box::new(sum_of_squares(col("a"))));
        let out = eval_f64(norm, &batch);
        assert!((out.value(0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn float_division_by_zero_is_nan_not_error() {
        let batch = list_batch(&[Some((vec![0.0], vec![0.0]))]);
        let quotient = binary(f64_lit(0.0), BinaryOp::Divide, f64_lit(0.0));
        let out = eval_f64(quotient, &batch);
        assert!(out.value(0).is_nan());
    }

    #[test]
    fn vector_to_array_converts_fixed_size_vectors() {
        use arrow::array::{FixedSizeListBuilder, Float32Builder};

        let mut fsl = FixedSizeListBuilder::new(Float32Builder::new(), 2);
        fsl.values().append_value(1.5);
        fsl.values().append_value(2.5);
        fsl.append(true);
        let schema = Arc::new(Schema::new(vec![Field::new(
            "emb",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), 2),
            true,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(fsl.finish())]).expect("batch");

        let sum = Expr::Aggregate {
            input: Box::new(Expr::VectorToArray(Box::new(col("emb")))),
            seed: Box::new(f64_lit(0.0)),
            acc: "acc".to_string(),
            param: "x".to_string(),
            body: Box::new(binary(
                Expr::BoundVar("acc".to_string()),
                BinaryOp::Plus,
                Expr::BoundVar("x".to_string()),
            )),
        };
        let out = eval_f64(sum, &batch);
        assert!((out.value(0) - 4.0).abs() < 1e-6);
    }
}

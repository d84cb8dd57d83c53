use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};
use veq_common::{Result, VeqError};

use crate::logical_plan::{BinaryOp, Expr, LiteralValue, LogicalPlan};

/// The analyzer needs schemas to resolve columns.
/// The client (Engine) provides this from its catalog.
pub trait SchemaProvider {
    /// Return schema for a table by name.
    fn table_schema(&self, table: &str) -> Result<SchemaRef>;
}

/// Type environment for lambda parameters while analyzing transform/aggregate
/// bodies.
type TypeEnv = HashMap<String, DataType>;

/// Logical-plan semantic analyzer.
///
/// Guarantees after [`Analyzer::analyze`]:
/// - unresolved `Expr::Column` references become `Expr::ColumnRef`;
/// - every expression (including lambda bodies) is typed and checked;
/// - `Int64`/`Float64` mixed arithmetic gets casts inserted;
/// - `WithColumn` is expanded into a projection carrying every input column
///   plus the derived expression as the last column.
///
/// Error taxonomy:
/// - `Planning`: name resolution and type mismatches
/// - `Unsupported`: shapes the engine intentionally rejects in v1
#[derive(Debug, Default)]
pub struct Analyzer;

impl Analyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyze a logical plan and return a semantically validated plan.
    pub fn analyze(&self, plan: LogicalPlan, provider: &dyn SchemaProvider) -> Result<LogicalPlan> {
        let (p, _schema) = self.analyze_plan(plan, provider)?;
        Ok(p)
    }

    /// Analyze and also return the plan's output schema.
    pub fn analyze_with_schema(
        &self,
        plan: LogicalPlan,
        provider: &dyn SchemaProvider,
    ) -> Result<(LogicalPlan, SchemaRef)> {
        self.analyze_plan(plan, provider)
    }

    fn analyze_plan(
        &self,
        plan: LogicalPlan,
        provider: &dyn SchemaProvider,
    ) -> Result<(LogicalPlan, SchemaRef)> {
        match plan {
            LogicalPlan::TableScan { table } => {
                let schema = provider.table_schema(&table)?;
                Ok((LogicalPlan::TableScan { table }, schema))
            }

            LogicalPlan::Projection { exprs, input } => {
                let (input, input_schema) = self.analyze_plan(*input, provider)?;
                let mut analyzed = Vec::with_capacity(exprs.len());
                let mut fields = Vec::with_capacity(exprs.len());
                for (e, name) in exprs {
                    let (ae, t) = self.analyze_expr(e, &input_schema, &TypeEnv::new())?;
                    fields.push(Field::new(name.clone(), t, true));
                    analyzed.push((ae, name));
                }
                let schema = Arc::new(Schema::new(fields));
                Ok((
                    LogicalPlan::Projection {
                        exprs: analyzed,
                        input: Box::new(input),
                    },
                    schema,
                ))
            }

            LogicalPlan::Filter { predicate, input } => {
                let (input, input_schema) = self.analyze_plan(*input, provider)?;
                let (pred, t) = self.analyze_expr(predicate, &input_schema, &TypeEnv::new())?;
                if t != DataType::Boolean {
                    return Err(VeqError::Planning(format!(
                        "filter predicate must be boolean, got {t}"
                    )));
                }
                Ok((
                    LogicalPlan::Filter {
                        predicate: pred,
                        input: Box::new(input),
                    },
                    input_schema,
                ))
            }

            LogicalPlan::WithColumn { name, expr, input } => {
                let (input, input_schema) = self.analyze_plan(*input, provider)?;
                if input_schema.column_with_name(&name).is_some() {
                    return Err(VeqError::Planning(format!(
                        "derived column '{name}' already exists in input"
                    )));
                }
                let (ae, t) = self.analyze_expr(expr, &input_schema, &TypeEnv::new())?;

                // Expansion keeps every input column, in order, then the
                // derived column last.
                let mut exprs = Vec::with_capacity(input_schema.fields().len() + 1);
                let mut fields = Vec::with_capacity(input_schema.fields().len() + 1);
                for (index, field) in input_schema.fields().iter().enumerate() {
                    exprs.push((
                        Expr::ColumnRef {
                            name: field.name().clone(),
                            index,
                        },
                        field.name().clone(),
                    ));
                    fields.push(field.as_ref().clone());
                }
                fields.push(Field::new(name.clone(), t, true));
                exprs.push((ae, name));

                let schema = Arc::new(Schema::new(fields));
                Ok((
                    LogicalPlan::Projection {
                        exprs,
                        input: Box::new(input),
                    },
                    schema,
                ))
            }

            LogicalPlan::Limit { n, input } => {
                let (input, input_schema) = self.analyze_plan(*input, provider)?;
                Ok((
                    LogicalPlan::Limit {
                        n,
                        input: Box::new(input),
                    },
                    input_schema,
                ))
            }
        }
    }

    fn analyze_expr(
        &self,
        expr: Expr,
        schema: &SchemaRef,
        env: &TypeEnv,
    ) -> Result<(Expr, DataType)> {
        match expr {
            Expr::Column(name) => {
                if !env.is_empty() {
                    return Err(VeqError::Unsupported(format!(
                        "column reference '{name}' inside a lambda body is not supported in v1"
                    )));
                }
                let (index, field) = schema.column_with_name(&name).ok_or_else(|| {
                    VeqError::Planning(format!("unknown column: {name}"))
                })?;
                let dt = field.data_type().clone();
                Ok((Expr::ColumnRef { name, index }, dt))
            }

            Expr::ColumnRef { name, index } => {
                if index >= schema.fields().len() {
                    return Err(VeqError::Planning(format!(
                        "column reference '{name}' out of bounds"
                    )));
                }
                let dt = schema.field(index).data_type().clone();
                Ok((Expr::ColumnRef { name, index }, dt))
            }

            Expr::Literal(v) => {
                let dt = literal_type(&v);
                Ok((Expr::Literal(v), dt))
            }

            Expr::BoundVar(name) => {
                let dt = env.get(&name).ok_or_else(|| {
                    VeqError::Planning(format!("unbound lambda parameter: {name}"))
                })?;
                let dt = dt.clone();
                Ok((Expr::BoundVar(name), dt))
            }

            Expr::Cast { expr, to_type } => {
                let (inner, _) = self.analyze_expr(*expr, schema, env)?;
                Ok((
                    Expr::Cast {
                        expr: Box::new(inner),
                        to_type: to_type.clone(),
                    },
                    to_type,
                ))
            }

            Expr::BinaryOp { left, op, right } => {
                let (l, lt) = self.analyze_expr(*left, schema, env)?;
                let (r, rt) = self.analyze_expr(*right, schema, env)?;
                let (l, r, operand_type) = coerce_binary(l, lt, r, rt, op)?;
                let out = match op {
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::LtEq
                    | BinaryOp::Gt
                    | BinaryOp::GtEq => DataType::Boolean,
                    BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide => {
                        operand_type
                    }
                };
                Ok((
                    Expr::BinaryOp {
                        left: Box::new(l),
                        op,
                        right: Box::new(r),
                    },
                    out,
                ))
            }

            Expr::Sqrt(e) => {
                let (inner, t) = self.analyze_expr(*e, schema, env)?;
                let inner = match t {
                    DataType::Float64 => inner,
                    DataType::Int64 => Expr::Cast {
                        expr: Box::new(inner),
                        to_type: DataType::Float64,
                    },
                    other => {
                        return Err(VeqError::Planning(format!(
                            "sqrt expects a Float64 operand, got {other}"
                        )));
                    }
                };
                Ok((Expr::Sqrt(Box::new(inner)), DataType::Float64))
            }

            Expr::Field { input, name } => {
                let (inner, t) = self.analyze_expr(*input, schema, env)?;
                let fields = match t {
                    DataType::Struct(fields) => fields,
                    other => {
                        return Err(VeqError::Planning(format!(
                            "field access '.{name}' expects a struct operand, got {other}"
                        )));
                    }
                };
                let field = fields
                    .iter()
                    .find(|f| f.name() == &name)
                    .ok_or_else(|| {
                        VeqError::Planning(format!("unknown struct field: {name}"))
                    })?;
                let dt = field.data_type().clone();
                Ok((
                    Expr::Field {
                        input: Box::new(inner),
                        name,
                    },
                    dt,
                ))
            }

            Expr::ArraysZip { left, right } => {
                if !env.is_empty() {
                    return Err(VeqError::Unsupported(
                        "arrays_zip inside a lambda body is not supported in v1".to_string(),
                    ));
                }
                let (l, lt) = self.analyze_expr(*left, schema, env)?;
                let (r, rt) = self.analyze_expr(*right, schema, env)?;
                check_float_list("arrays_zip", &lt)?;
                check_float_list("arrays_zip", &rt)?;
                Ok((
                    Expr::ArraysZip {
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    DataType::List(Arc::new(Field::new("item", zip_pair_type(), true))),
                ))
            }

            Expr::Transform { input, param, body } => {
                if !env.is_empty() {
                    return Err(VeqError::Unsupported(
                        "transform inside a lambda body is not supported in v1".to_string(),
                    ));
                }
                let (inner, t) = self.analyze_expr(*input, schema, env)?;
                let elem = list_element_type("transform", &t)?;
                let mut body_env = TypeEnv::new();
                body_env.insert(param.clone(), elem);
                let (b, bt) = self.analyze_expr(*body, schema, &body_env)?;
                Ok((
                    Expr::Transform {
                        input: Box::new(inner),
                        param,
                        body: Box::new(b),
                    },
                    DataType::List(Arc::new(Field::new("item", bt, true))),
                ))
            }

            Expr::Aggregate {
                input,
                seed,
                acc,
                param,
                body,
            } => {
                if !env.is_empty() {
                    return Err(VeqError::Unsupported(
                        "aggregate inside a lambda body is not supported in v1".to_string(),
                    ));
                }
                let (inner, t) = self.analyze_expr(*input, schema, env)?;
                let elem = list_element_type("aggregate", &t)?;
                let (s, st) = self.analyze_expr(*seed, schema, env)?;
                let mut body_env = TypeEnv::new();
                body_env.insert(acc.clone(), st.clone());
                body_env.insert(param.clone(), elem);
                let (b, bt) = self.analyze_expr(*body, schema, &body_env)?;
                if bt != st {
                    return Err(VeqError::Planning(format!(
                        "aggregate body type {bt} does not match seed type {st}"
                    )));
                }
                Ok((
                    Expr::Aggregate {
                        input: Box::new(inner),
                        seed: Box::new(s),
                        acc,
                        param,
                        body: Box::new(b),
                    },
                    st,
                ))
            }

            Expr::VectorToArray(e) => {
                let (inner, t) = self.analyze_expr(*e, schema, env)?;
                match &t {
                    DataType::FixedSizeList(field, _)
                        if matches!(
                            field.data_type(),
                            DataType::Float32 | DataType::Float64
                        ) => {}
                    other => {
                        return Err(VeqError::Planning(format!(
                            "vector_to_array expects a FixedSizeList of floats, got {other}"
                        )));
                    }
                }
                Ok((
                    Expr::VectorToArray(Box::new(inner)),
                    DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                ))
            }
        }
    }
}

/// Element struct type produced by `arrays_zip`.
pub fn zip_pair_type() -> DataType {
    DataType::Struct(Fields::from(vec![
        Field::new("left", DataType::Float64, true),
        Field::new("right", DataType::Float64, true),
    ]))
}

fn literal_type(v: &LiteralValue) -> DataType {
    match v {
        LiteralValue::Int64(_) => DataType::Int64,
        LiteralValue::Float64(_) => DataType::Float64,
        LiteralValue::Utf8(_) => DataType::Utf8,
        LiteralValue::Boolean(_) => DataType::Boolean,
        LiteralValue::Null => DataType::Null,
    }
}

fn check_float_list(op: &str, t: &DataType) -> Result<()> {
    match t {
        DataType::List(field) if field.data_type() == &DataType::Float64 => Ok(()),
        other => Err(VeqError::Planning(format!(
            "{op} expects List<Float64> operands, got {other}"
        ))),
    }
}

fn list_element_type(op: &str, t: &DataType) -> Result<DataType> {
    match t {
        DataType::List(field) => Ok(field.data_type().clone()),
        other => Err(VeqError::Planning(format!(
            "{op} expects a List operand, got {other}"
        ))),
    }
}

/// Equalize operand types, inserting `Int64 -> Float64` casts where needed.
fn coerce_binary(
    l: Expr,
    lt: DataType,
    r: Expr,
    rt: DataType,
    op: BinaryOp,
) -> Result<(Expr, Expr, DataType)> {
    if lt == rt {
        return Ok((l, r, lt));
    }
    match (&lt, &rt) {
        (DataType::Int64, DataType::Float64) => Ok((
            Expr::Cast {
                expr: Box::new(l),
                to_type: DataType::Float64,
            },
            r,
            DataType::Float64,
        )),
        (DataType::Float64, DataType::Int64) => Ok((
            l,
            Expr::Cast {
                expr: Box::new(r),
                to_type: DataType::Float64,
            },
            DataType::Float64,
        )),
        _ => Err(VeqError::Planning(format!(
            "operands of {} must have matching types, got {lt} vs {rt}",
            op.symbol()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema, SchemaRef};
    use veq_common::Result;

    use super::{Analyzer, SchemaProvider, zip_pair_type};
    use crate::logical_plan::{BinaryOp, Expr, LiteralValue, LogicalPlan};

    struct FixedProvider(SchemaRef);

    impl SchemaProvider for FixedProvider {
        fn table_schema(&self, table: &str) -> Result<SchemaRef> {
            if table == "t" {
                Ok(self.0.clone())
            } else {
                Err(veq_common::VeqError::Planning(format!(
                    "unknown table: {table}"
                )))
            }
        }
    }

    fn provider() -> FixedProvider {
        FixedProvider(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new(
                "a",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                true,
            ),
            Field::new(
                "b",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                true,
            ),
        ])))
    }

    fn scan() -> LogicalPlan {
        LogicalPlan::TableScan {
            table: "t".to_string(),
        }
    }

    fn sum_of_squares(input: Expr) -> Expr {
        Expr::Aggregate {
            input: Box::new(input),
            seed: Box::new(Expr::Literal(LiteralValue::Float64(0.0))),
            acc: "acc".to_string(),
            param: "x".to_string(),
            body: Box::new(Expr::BinaryOp {
                left: Box::new(Expr::BoundVar("acc".to_string())),
                op: BinaryOp::Plus,
                right: Box::new(Expr::BinaryOp {
                    left: Box::new(Expr::BoundVar("x".to_string())),
                    op: BinaryOp::Multiply,
                    right: Box::new(Expr::BoundVar("x".to_string())),
                }),
            }),
        }
    }

    #[test]
    fn with_column_expands_to_full_projection() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "sq".to_string(),
            expr: sum_of_squares(Expr::Column("a".to_string())),
            input: Box::new(scan()),
        };

        let (analyzed, schema) = analyzer
            .analyze_with_schema(plan, &provider())
            .expect("analyze");

        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(schema.field(3).name(), "sq");
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);

        let LogicalPlan::Projection { exprs, .. } = analyzed else {
            panic!("with_column must expand to projection");
        };
        assert_eq!(exprs.len(), 4);
        assert!(matches!(
            exprs[0].0,
            Expr::ColumnRef { index: 0, .. }
        ));
    }

    #[test]
    fn with_column_rejects_duplicate_name() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "id".to_string(),
            expr: Expr::Literal(LiteralValue::Float64(1.0)),
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("duplicate");
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn unknown_column_is_planning_error() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "out".to_string(),
            expr: sum_of_squares(Expr::Column("missing".to_string())),
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("unknown");
        assert!(err.to_string().contains("unknown column: missing"));
    }

    #[test]
    fn zip_requires_float_lists() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "z".to_string(),
            expr: Expr::ArraysZip {
                left: Box::new(Expr::Column("id".to_string())),
                right: Box::new(Expr::Column("b".to_string())),
            },
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("type");
        assert!(err.to_string().contains("List<Float64>"));
    }

    #[test]
    fn zip_output_is_pair_list_and_field_access_types() {
        let analyzer = Analyzer::new();
        let dot_body = Expr::BinaryOp {
            left: Box::new(Expr::BoundVar("acc".to_string())),
            op: BinaryOp::Plus,
            right: Box::new(Expr::BinaryOp {
                left: Box::new(Expr::Field {
                    input: Box::new(Expr::BoundVar("x".to_string())),
                    name: "left".to_string(),
                }),
                op: BinaryOp::Multiply,
                right: Box::new(Expr::Field {
                    input: Box::new(Expr::BoundVar("x".to_string())),
                    name: "right".to_string(),
                }),
            }),
        };
        let plan = LogicalPlan::WithColumn {
            name: "dot".to_string(),
            expr: Expr::Aggregate {
                input: Box::new(Expr::ArraysZip {
                    left: Box::new(Expr::Column("a".to_string())),
                    right: Box::new(Expr::Column("b".to_string())),
                }),
                seed: Box::new(Expr::Literal(LiteralValue::Float64(0.0))),
                acc: "acc".to_string(),
                param: "x".to_string(),
                body: Box::new(dot_body),
            },
            input: Box::new(scan()),
        };
        let (_, schema) = analyzer
            .analyze_with_schema(plan, &provider())
            .expect("analyze");
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);
        // Sanity-check the pair element type helper used by execution.
        assert!(matches!(zip_pair_type(), DataType::Struct(_)));
    }

    #[test]
    fn aggregate_body_must_match_seed_type() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "bad".to_string(),
            expr: Expr::Aggregate {
                input: Box::new(Expr::Column("a".to_string())),
                seed: Box::new(Expr::Literal(LiteralValue::Utf8("x".to_string()))),
                acc: "acc".to_string(),
                param: "x".to_string(),
                body: Box::new(Expr::BoundVar("x".to_string())),
            },
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("mismatch");
        assert!(err.to_string().contains("does not match seed type"));
    }

    #[test]
    fn mixed_int_float_arithmetic_gets_cast() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "scaled".to_string(),
            expr: Expr::BinaryOp {
                left: Box::new(Expr::Column("id".to_string())),
                op: BinaryOp::Multiply,
                right: Box::new(Expr::Literal(LiteralValue::Float64(0.5))),
            },
            input: Box::new(scan()),
        };
        let (analyzed, schema) = analyzer
            .analyze_with_schema(plan, &provider())
            .expect("analyze");
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);
        let LogicalPlan::Projection { exprs, .. } = analyzed else {
            panic!("projection expected");
        };
        let Expr::BinaryOp { left, .. } = &exprs[3].0 else {
            panic!("binary expected");
        };
        assert!(matches!(**left, Expr::Cast { .. }));
    }

    #[test]
    fn filter_predicate_must_be_boolean() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::Filter {
            predicate: Expr::Literal(LiteralValue::Int64(1)),
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("boolean");
        assert!(err.to_string().contains("must be boolean"));
    }

    #[test]
    fn unbound_lambda_parameter_is_planning_error() {
        let analyzer = Analyzer::new();
        let plan = LogicalPlan::WithColumn {
            name: "out".to_string(),
            expr: Expr::Aggregate {
                input: Box::new(Expr::Column("a".to_string())),
                seed: Box::new(Expr::Literal(LiteralValue::Float64(0.0))),
                acc: "acc".to_string(),
                param: "x".to_string(),
                body: Box::new(Expr::BoundVar("y".to_string())),
            },
            input: Box::new(scan()),
        };
        let err = analyzer.analyze(plan, &provider()).expect_err("unbound");
        assert!(err.to_string().contains("unbound lambda parameter: y"));
    }
}

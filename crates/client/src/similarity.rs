//! Similarity and distance columns over array-valued embedding columns.
//!
//! Both helpers only build an expression tree; evaluation (and therefore any
//! failure: unknown column, non-array type, per-row length mismatch) happens
//! when the returned DataFrame is collected.

use crate::dataframe::DataFrame;
use crate::expr::{
    add, aggregate, arrays_zip, col, div, field, lit_f64, mul, sqrt, sub, transform, var,
};
use veq_planner::Expr;

/// `sqrt(aggregate(col, 0.0, (acc, x) -> acc + x * x))`
fn norm(column: &str) -> Expr {
    sqrt(aggregate(
        col(column),
        lit_f64(0.0),
        "acc",
        "x",
        add(var("acc"), mul(var("x"), var("x"))),
    ))
}

/// Appends a `"cosine"` column with the cosine similarity between two
/// `List<Float64>` columns.
///
/// The cosine similarity is the dot product of the two arrays divided by the
/// product of their magnitudes:
/// - the dot product folds over the zipped pair of arrays;
/// - each norm folds the squares of one array and takes the square root.
///
/// Rows where both arrays have zero magnitude divide zero by zero and come
/// out as NaN; no guard is applied.
///
/// Note:
/// - `left` and `right` must be array columns. If they hold the engine's
///   fixed-dimension vector type, convert them first, e.g.
///   `df.with_column(left, vector_to_array(col(left)))`.
pub fn cosine_similarity(df: DataFrame, left: &str, right: &str) -> DataFrame {
    // Multiply each paired position of the two embeddings and accumulate.
    let dot = aggregate(
        arrays_zip(col(left), col(right)),
        lit_f64(0.0),
        "acc",
        "x",
        add(
            var("acc"),
            mul(field(var("x"), "left"), field(var("x"), "right")),
        ),
    );

    let cosine = div(dot, mul(norm(left), norm(right)));

    df.with_column("cosine", cosine)
}

/// Appends a `"euclidean_distance"` column with the straight-line distance
/// between two `List<Float64>` columns.
///
/// Per row: the element-wise difference of the zipped arrays, the fold of its
/// squares, and the square root of that sum.
///
/// Note:
/// - `left` and `right` must be array columns; see [`cosine_similarity`] for
///   converting fixed-dimension vector columns.
pub fn euclidean_distance(df: DataFrame, left: &str, right: &str) -> DataFrame {
    // Element-wise difference of the two embeddings.
    let difference = transform(
        arrays_zip(col(left), col(right)),
        "x",
        sub(field(var("x"), "left"), field(var("x"), "right")),
    );

    // Square each difference and accumulate.
    let square = aggregate(
        difference,
        lit_f64(0.0),
        "acc",
        "x",
        add(var("acc"), mul(var("x"), var("x"))),
    );

    df.with_column("euclidean_distance", sqrt(square))
}

use crate::logical_plan::LogicalPlan;

/// Render logical plan as human-readable multiline text.
pub fn explain_logical(plan: &LogicalPlan) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &LogicalPlan, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match plan {
        LogicalPlan::TableScan { table } => {
            out.push_str(&format!("{pad}TableScan table={table}\n"));
        }
        LogicalPlan::Filter { predicate, input } => {
            out.push_str(&format!("{pad}Filter {predicate}\n"));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Projection { exprs, input } => {
            out.push_str(&format!("{pad}Projection\n"));
            for (e, name) in exprs {
                out.push_str(&format!("{pad}  {name} := {e}\n"));
            }
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::WithColumn { name, expr, input } => {
            out.push_str(&format!("{pad}WithColumn {name} := {expr}\n"));
            fmt_plan(input, indent + 1, out);
        }
        LogicalPlan::Limit { n, input } => {
            out.push_str(&format!("{pad}Limit n={n}\n"));
            fmt_plan(input, indent + 1, out);
        }
    }
}

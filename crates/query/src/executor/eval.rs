//! Expression evaluation.
//!
//! Evaluation never fails: a column that cannot be resolved, a missing
//! parameter or an ill-typed operand yields `Value::Null`, and NULL
//! propagates through comparisons and arithmetic. Predicates pass only on
//! `Boolean(true)`.

use super::row::ResultRow;
use super::source::RowSource;
use crate::ast::{BinaryOp, Expr, UnaryOp};
use resumedb_core::pattern_match;
use resumedb_core::Value;

/// Per-call evaluation context.
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub source: &'a dyn RowSource,
    pub params: &'a [Value],
}

impl<'a> ExecContext<'a> {
    pub fn new(source: &'a dyn RowSource, params: &'a [Value]) -> Self {
        Self { source, params }
    }

    fn param(&self, index: usize) -> Value {
        self.params.get(index).cloned().unwrap_or(Value::Null)
    }
}

/// Evaluates `expr` against `row`. Columns and identities not found in
/// `row` are looked up in `outer`, the enclosing join row.
pub fn eval_expr(expr: &Expr, row: &ResultRow, outer: Option<&ResultRow>, ctx: &ExecContext<'_>) -> Value {
    match expr {
        Expr::Column(col) => {
            if let Some(v) = row.column(&col.table, col.index) {
                return v.clone();
            }
            if let Some(v) = outer.and_then(|o| o.column(&col.table, col.index)) {
                return v.clone();
            }
            // Unknown extent: address the row positionally
            row.get(col.index).cloned().unwrap_or(Value::Null)
        }

        Expr::Identity(extent) => {
            let id = if row.layout().slot(extent).is_some() {
                row.identity_of(extent)
            } else {
                outer.and_then(|o| o.identity_of(extent))
            };
            id.map(Value::Reference).unwrap_or(Value::Null)
        }

        Expr::Literal(value) => value.clone(),

        Expr::Parameter(index) => ctx.param(*index),

        Expr::BinaryOp { left, op, right } => {
            let left_val = eval_expr(left, row, outer, ctx);
            let right_val = eval_expr(right, row, outer, ctx);
            eval_binary_op(*op, &left_val, &right_val)
        }

        Expr::UnaryOp { op, expr } => {
            let val = eval_expr(expr, row, outer, ctx);
            eval_unary_op(*op, &val)
        }

        Expr::Between { expr, low, high } => {
            let val = eval_expr(expr, row, outer, ctx);
            let low_val = eval_expr(low, row, outer, ctx);
            let high_val = eval_expr(high, row, outer, ctx);
            if val.is_null() || low_val.is_null() || high_val.is_null() {
                return Value::Null;
            }
            Value::Boolean(val >= low_val && val <= high_val)
        }

        Expr::In { expr, list } => {
            let val = eval_expr(expr, row, outer, ctx);
            if val.is_null() {
                return Value::Null;
            }
            let found = list.iter().any(|item| eval_expr(item, row, outer, ctx) == val);
            Value::Boolean(found)
        }

        Expr::Like { expr, pattern } => match eval_expr(expr, row, outer, ctx) {
            Value::String(s) => Value::Boolean(pattern_match::like(&s, pattern)),
            Value::Null => Value::Null,
            _ => Value::Boolean(false),
        },
    }
}

/// Evaluates a predicate. NULL and non-boolean results do not pass.
#[inline]
pub fn eval_predicate(expr: &Expr, row: &ResultRow, outer: Option<&ResultRow>, ctx: &ExecContext<'_>) -> bool {
    matches!(eval_expr(expr, row, outer, ctx), Value::Boolean(true))
}

fn eval_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return match op {
            // NULL AND FALSE = FALSE, NULL AND TRUE = NULL
            BinaryOp::And => {
                if matches!(left, Value::Boolean(false)) || matches!(right, Value::Boolean(false)) {
                    Value::Boolean(false)
                } else {
                    Value::Null
                }
            }
            // NULL OR TRUE = TRUE, NULL OR FALSE = NULL
            BinaryOp::Or => {
                if matches!(left, Value::Boolean(true)) || matches!(right, Value::Boolean(true)) {
                    Value::Boolean(true)
                } else {
                    Value::Null
                }
            }
            _ => Value::Null,
        };
    }

    match op {
        BinaryOp::Eq => Value::Boolean(left == right),
        BinaryOp::Ne => Value::Boolean(left != right),
        BinaryOp::Lt => Value::Boolean(left < right),
        BinaryOp::Le => Value::Boolean(left <= right),
        BinaryOp::Gt => Value::Boolean(left > right),
        BinaryOp::Ge => Value::Boolean(left >= right),
        BinaryOp::And => {
            let l = matches!(left, Value::Boolean(true));
            let r = matches!(right, Value::Boolean(true));
            Value::Boolean(l && r)
        }
        BinaryOp::Or => {
            let l = matches!(left, Value::Boolean(true));
            let r = matches!(right, Value::Boolean(true));
            Value::Boolean(l || r)
        }
        BinaryOp::Add => eval_arithmetic(left, right, i64::checked_add, |a, b| a + b),
        BinaryOp::Sub => eval_arithmetic(left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => eval_arithmetic(left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => match right {
            Value::Float64(f) if *f == 0.0 => Value::Null,
            _ => eval_arithmetic(left, right, i64::checked_div, |a, b| a / b),
        },
        BinaryOp::Mod => eval_arithmetic(left, right, integer_rem, |a, b| a % b),
    }
}

/// Integer operands stay integers, with overflow and division by zero
/// giving NULL. Any float operand makes the result a float.
fn eval_arithmetic<I, F>(left: &Value, right: &Value, int_op: I, float_op: F) -> Value
where
    I: Fn(i64, i64) -> Option<i64>,
    F: Fn(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => int_op(i64::from(*a), i64::from(*b))
            .and_then(|n| i32::try_from(n).ok())
            .map_or(Value::Null, Value::Int32),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            match (as_integer(left), as_integer(right)) {
                (Some(a), Some(b)) => int_op(a, b).map_or(Value::Null, Value::Int64),
                _ => Value::Null,
            }
        }
        _ => match (left.as_numeric(), right.as_numeric()) {
            (Some(a), Some(b)) => Value::Float64(float_op(a, b)),
            _ => Value::Null,
        },
    }
}

/// `MIN % -1` is zero; only a zero divisor has no remainder.
fn integer_rem(a: i64, b: i64) -> Option<i64> {
    (b != 0).then(|| a.wrapping_rem(b))
}

#[inline]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(v) => Some(i64::from(*v)),
        Value::Int64(v) => Some(*v),
        _ => None,
    }
}

fn eval_unary_op(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => match value {
            Value::Boolean(b) => Value::Boolean(!b),
            _ => Value::Null,
        },
        UnaryOp::Neg => match value {
            Value::Int32(i) => i.checked_neg().map_or(Value::Null, Value::Int32),
            Value::Int64(i) => i.checked_neg().map_or(Value::Null, Value::Int64),
            Value::Float64(f) => Value::Float64(-f),
            _ => Value::Null,
        },
        UnaryOp::IsNull => Value::Boolean(value.is_null()),
        UnaryOp::IsNotNull => Value::Boolean(!value.is_null()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::row::RowLayout;
    use crate::executor::source::EmptySource;
    use std::sync::Arc;

    fn account_row() -> ResultRow {
        ResultRow::new(
            vec![Value::Int64(3), Value::String("ann".into()), Value::Null],
            vec![Some(42)],
            Arc::new(RowLayout::extent("Account", 3)),
        )
    }

    fn eval(expr: &Expr) -> Value {
        let source = EmptySource;
        let params = [Value::Int64(10)];
        let ctx = ExecContext::new(&source, &params);
        eval_expr(expr, &account_row(), None, &ctx)
    }

    #[test]
    fn test_column_identity_and_params() {
        assert_eq!(eval(&Expr::column("Account", "accountid", 0)), Value::Int64(3));
        assert_eq!(eval(&Expr::identity("Account")), Value::Reference(42));
        assert_eq!(eval(&Expr::identity("Transfer")), Value::Null);
        assert_eq!(eval(&Expr::param(0)), Value::Int64(10));
        assert_eq!(eval(&Expr::param(5)), Value::Null);
    }

    #[test]
    fn test_outer_row_lookup() {
        let source = EmptySource;
        let ctx = ExecContext::new(&source, &[]);
        let transfer = ResultRow::new(
            vec![Value::Int64(99)],
            vec![Some(7)],
            Arc::new(RowLayout::extent("Transfer", 1)),
        );
        let outer = account_row();
        let expr = Expr::eq(Expr::column("Account", "owner", 1), Expr::literal("ann"));
        assert!(eval_predicate(&expr, &transfer, Some(&outer), &ctx));
        assert_eq!(
            eval_expr(&Expr::identity("Account"), &transfer, Some(&outer), &ctx),
            Value::Reference(42)
        );
    }

    #[test]
    fn test_null_propagation() {
        let null_col = Expr::column("Account", "note", 2);
        assert_eq!(eval(&Expr::eq(null_col.clone(), Expr::literal(1i64))), Value::Null);
        assert_eq!(
            eval(&Expr::and(null_col.clone(), Expr::literal(false))),
            Value::Boolean(false)
        );
        assert_eq!(eval(&Expr::or(null_col.clone(), Expr::literal(true))), Value::Boolean(true));
        assert_eq!(eval(&Expr::is_null(null_col)), Value::Boolean(true));
    }

    #[test]
    fn test_arithmetic_keeps_integer_types() {
        let id = Expr::column("Account", "accountid", 0);
        assert_eq!(eval(&Expr::add(id.clone(), Expr::literal(2i32))), Value::Int64(5));
        assert_eq!(eval(&Expr::mul(id.clone(), Expr::literal(0.5f64))), Value::Float64(1.5));
        let div = Expr::BinaryOp {
            left: Box::new(id),
            op: BinaryOp::Div,
            right: Box::new(Expr::literal(0i64)),
        };
        assert_eq!(eval(&div), Value::Null);
    }

    #[test]
    fn test_integer_overflow_does_not_panic() {
        let binary = |left: Value, op, right: Value| Expr::BinaryOp {
            left: Box::new(Expr::literal(left)),
            op,
            right: Box::new(Expr::literal(right)),
        };
        let neg = |value: Value| Expr::UnaryOp {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::literal(value)),
        };
        assert_eq!(eval(&binary(Value::Int64(i64::MIN), BinaryOp::Mod, Value::Int64(-1))), Value::Int64(0));
        assert_eq!(eval(&binary(Value::Int32(i32::MIN), BinaryOp::Mod, Value::Int32(-1))), Value::Int32(0));
        assert_eq!(eval(&binary(Value::Int64(i64::MIN), BinaryOp::Div, Value::Int64(-1))), Value::Null);
        assert_eq!(eval(&binary(Value::Int64(i64::MAX), BinaryOp::Add, Value::Int64(1))), Value::Null);
        assert_eq!(eval(&binary(Value::Int32(i32::MAX), BinaryOp::Mul, Value::Int32(2))), Value::Null);
        assert_eq!(eval(&neg(Value::Int64(i64::MIN))), Value::Null);
        assert_eq!(eval(&neg(Value::Int32(i32::MIN))), Value::Null);
        assert_eq!(eval(&neg(Value::Int64(7))), Value::Int64(-7));
        assert_eq!(eval(&binary(Value::Int64(-7), BinaryOp::Mod, Value::Int32(3))), Value::Int64(-1));
        assert_eq!(eval(&binary(Value::Int64(7), BinaryOp::Mod, Value::Int64(0))), Value::Null);
    }

    #[test]
    fn test_large_integers_keep_precision() {
        let big = (1i64 << 53) + 1;
        let add = Expr::add(Expr::literal(big), Expr::literal(2i64));
        assert_eq!(eval(&add), Value::Int64(big + 2));
        let product = Expr::mul(Expr::literal(3_000_000_007i64), Expr::literal(3_000_000_019i64));
        assert_eq!(eval(&product), Value::Int64(9_000_000_078_000_000_133));
        let div = Expr::BinaryOp {
            left: Box::new(Expr::literal(-7i64)),
            op: BinaryOp::Div,
            right: Box::new(Expr::literal(2i64)),
        };
        assert_eq!(eval(&div), Value::Int64(-3));
    }

    #[test]
    fn test_between_in_like() {
        let id = Expr::column("Account", "accountid", 0);
        let owner = Expr::column("Account", "owner", 1);
        assert_eq!(
            eval(&Expr::between(id.clone(), Expr::literal(1i64), Expr::literal(3i64))),
            Value::Boolean(true)
        );
        assert_eq!(
            eval(&Expr::in_list(id, vec![Value::Int32(3), Value::Int64(4)])),
            Value::Boolean(true)
        );
        assert_eq!(eval(&Expr::like(owner.clone(), "a%")), Value::Boolean(true));
        assert_eq!(eval(&Expr::like(owner, "b_")), Value::Boolean(false));
    }
}

// Restricted evaluator for basis expressions.
//
// Only literals, unary sign and the binary arithmetic operators are evaluated.
// Cell references and calls are never resolved here: they make the whole
// expression "not evaluable".

use super::parser::{self, Expr, Op};
use super::refs::has_cell_reference;

/// Evaluate free-text arithmetic. Returns `None` for anything that is not
/// a finite result of the restricted grammar.
///
/// Text containing a cell-reference-shaped token is rejected before parsing.
pub fn evaluate(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_prefix('=').unwrap_or(text);

    if text.is_empty() || has_cell_reference(text) {
        return None;
    }

    match parser::parse(text) {
        Ok(expr) => eval_expr(&expr),
        Err(e) => {
            log::trace!("not evaluable {:?}: {}", text, e);
            None
        }
    }
}

/// Evaluate a parsed expression. Non-arithmetic nodes yield `None`.
pub fn eval_expr(expr: &Expr) -> Option<f64> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::CellRef(_) | Expr::Function { .. } => return None,
        Expr::Neg(inner) => -eval_expr(inner)?,
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left)?;
            let r = eval_expr(right)?;
            apply_op(*op, l, r)?
        }
    };

    value.is_finite().then_some(value)
}

fn apply_op(op: Op, l: f64, r: f64) -> Option<f64> {
    match op {
        Op::Add => Some(l + r),
        Op::Sub => Some(l - r),
        Op::Mul => Some(l * r),
        Op::Div => (r != 0.0).then(|| l / r),
        Op::FloorDiv => (r != 0.0).then(|| (l / r).floor()),
        Op::Mod => {
            if r == 0.0 {
                return None;
            }
            // Floored modulo: the result takes the sign of the divisor
            let m = l % r;
            if m != 0.0 && (m < 0.0) != (r < 0.0) {
                Some(m + r)
            } else {
                Some(m)
            }
        }
        Op::Pow => Some(l.powf(r)),
    }
}

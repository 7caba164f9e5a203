//! ROUND-call resolution and tolerance derivation.
//!
//! Quantity cells are usually `=ROUND(<basis>, n)`. The digit count `n` tells
//! us how precisely the author expected the quantity to match, and therefore
//! how much slack a comparison needs.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::formula::{self, eval_expr, CellAddr, Expr, Op, ValueLookup};

/// Digit count assumed when a quantity formula carries no ROUND call.
pub const DEFAULT_ROUND_DIGITS: i32 = 3;

/// How a tolerance is derived from a digit count:
/// `max(factor * 10^-digits, floor)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToleranceRule {
    pub factor: f64,
    pub floor: f64,
}

impl Default for ToleranceRule {
    fn default() -> Self {
        // Half a unit in the last place is the theoretical maximum rounding
        // error; 0.6 leaves room for float and spreadsheet differences.
        Self {
            factor: 0.6,
            floor: 1e-6,
        }
    }
}

impl ToleranceRule {
    pub fn tolerance(&self, digits: i32) -> f64 {
        (self.factor * 10f64.powi(-digits)).max(self.floor)
    }
}

/// Rounding precision and the comparison tolerance it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceSpec {
    pub digits: i32,
    pub tolerance: f64,
}

impl ToleranceSpec {
    pub fn from_digits(digits: i32, rule: &ToleranceRule) -> Self {
        Self {
            digits,
            tolerance: rule.tolerance(digits),
        }
    }

    /// Digits from the first ROUND call in `formula`, else `default_digits`.
    pub fn for_formula(formula: &str, default_digits: i32, rule: &ToleranceRule) -> Self {
        let digits = round_digits(formula).unwrap_or(default_digits);
        Self::from_digits(digits, rule)
    }
}

fn round_digits_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)ROUND\s*\(.*?,\s*(-?\d+)\s*\)").expect("static ROUND digits pattern")
    })
}

/// Digit argument of the first `ROUND(…, n)` anywhere in `formula`.
pub fn round_digits(formula: &str) -> Option<i32> {
    let caps = round_digits_pattern().captures(formula)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Spreadsheet ROUND: half away from zero, negative digits round left of
/// the decimal point.
pub fn round_half_away(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 { value * factor } else { value / factor };
    // 2.675 is stored as 2.67499999…; spreadsheets still round it up.
    let nudged = scaled + scaled.signum() * scaled.abs().max(1.0) * 1e-12;
    let rounded = if digits >= 0 {
        nudged.round() / factor
    } else {
        nudged.round() * factor
    };
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A quantity formula that is a single ROUND call in one of the two
/// supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundCall {
    /// `ROUND(expr, n)` where `expr` is plain arithmetic.
    Pure { expr: Expr, digits: i32 },
    /// `ROUND(cell [* multiplier], n)`: the referenced cell's cached value
    /// is used instead of recomputing its formula, so multi-step rounding
    /// chains compare the way the spreadsheet computed them.
    Scaled {
        cell: CellAddr,
        multiplier: f64,
        digits: i32,
    },
}

impl RoundCall {
    pub fn parse(formula: &str) -> Option<Self> {
        let expr = formula::parse(formula).ok()?;
        let Expr::Function { name, args } = expr else {
            return None;
        };
        if name != "ROUND" || args.len() != 2 {
            return None;
        }

        let digits = integer_literal(&args[1])?;
        let inner = &args[0];

        if inner.is_arithmetic() {
            return Some(RoundCall::Pure {
                expr: inner.clone(),
                digits,
            });
        }

        let (cell, multiplier) = scaled_ref(inner)?;
        Some(RoundCall::Scaled {
            cell,
            multiplier,
            digits,
        })
    }

    pub fn digits(&self) -> i32 {
        match self {
            RoundCall::Pure { digits, .. } | RoundCall::Scaled { digits, .. } => *digits,
        }
    }

    /// Expected rounded value, or `None` if the inner expression cannot be
    /// evaluated or the referenced cell holds no number.
    pub fn resolve(&self, values: &dyn ValueLookup) -> Option<f64> {
        match self {
            RoundCall::Pure { expr, digits } => eval_expr(expr).map(|v| round_half_away(v, *digits)),
            RoundCall::Scaled {
                cell,
                multiplier,
                digits,
            } => values
                .value_at(*cell)
                .map(|v| round_half_away(v * multiplier, *digits)),
        }
    }

    /// Short label used as a rule name in reports.
    pub fn label(&self) -> String {
        match self {
            RoundCall::Pure { digits, .. } => format!("declared:ROUND(pure_expr,{digits})"),
            RoundCall::Scaled {
                cell,
                multiplier,
                digits,
            } => format!("declared:ROUND({cell}*{multiplier},{digits})"),
        }
    }
}

fn integer_literal(expr: &Expr) -> Option<i32> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::Neg(inner) => match inner.as_ref() {
            Expr::Number(n) => -*n,
            _ => return None,
        },
        _ => return None,
    };
    (value.fract() == 0.0 && value.abs() <= 15.0).then_some(value as i32)
}

fn scaled_ref(expr: &Expr) -> Option<(CellAddr, f64)> {
    match expr {
        Expr::CellRef(cell) => Some((*cell, 1.0)),
        Expr::BinaryOp {
            op: Op::Mul,
            left,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (Expr::CellRef(cell), Expr::Number(m)) | (Expr::Number(m), Expr::CellRef(cell)) => {
                Some((*cell, *m))
            }
            _ => None,
        },
        _ => None,
    }
}

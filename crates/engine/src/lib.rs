//! `qtyaudit-engine`: restricted arithmetic for quantity sheets.
//!
//! Evaluates basis expressions with a small fixed grammar, resolves the
//! ROUND shapes found in quantity formulas, and derives comparison
//! tolerances from rounding digits. No I/O.

pub mod formula;
pub mod rounding;

pub use formula::{evaluate, has_cell_reference, CellAddr, NoValues, ValueLookup};
pub use rounding::{
    round_digits, round_half_away, RoundCall, ToleranceRule, ToleranceSpec, DEFAULT_ROUND_DIGITS,
};

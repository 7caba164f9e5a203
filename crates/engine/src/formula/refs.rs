//! Cell addresses and cell-reference detection.
//!
//! Quantity sheets mix plain arithmetic with references to other cells.
//! Anything that looks like a reference is treated as unsafe to evaluate
//! locally, since the referenced cell's current value may differ from what
//! the formula text implies.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// A zero-based (column, row) cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddr {
    pub col: usize,
    pub row: usize,
}

impl CellAddr {
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// Parse an A1-style address. `$` anchors are accepted and ignored.
    ///
    /// Column letters are limited to three (`XFD` is the widest sheet column).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_uppercase();
        let mut chars = s.chars().peekable();

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let mut col_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_uppercase() {
                col_str.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if col_str.is_empty() || col_str.len() > 3 {
            return None;
        }

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let row_str: String = chars.collect();
        if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let row: usize = row_str.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self {
            col: letters_to_col(&col_str)?,
            row: row - 1,
        })
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Convert a zero-based column index to letters (0 = A, 25 = Z, 26 = AA).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// Convert column letters to a zero-based index (A = 0, AA = 26).
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let n = letters
        .to_ascii_uppercase()
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c as usize - 'A' as usize + 1));
    Some(n - 1)
}

fn cell_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?[A-Za-z]{1,3}\$?\d+").expect("static cell-reference pattern"))
}

/// True if `expr` contains anything shaped like a cell reference
/// (one to three letters followed by digits, optionally `$`-anchored).
pub fn has_cell_reference(expr: &str) -> bool {
    cell_ref_pattern().is_match(expr)
}

/// Read access to the cached-value view of a sheet.
pub trait ValueLookup {
    /// The last computed numeric value of `cell`, if it holds a number.
    fn value_at(&self, cell: CellAddr) -> Option<f64>;
}

impl ValueLookup for HashMap<CellAddr, f64> {
    fn value_at(&self, cell: CellAddr) -> Option<f64> {
        self.get(&cell).copied()
    }
}

/// A lookup with no cached values, for callers that only hold formula text.
pub struct NoValues;

impl ValueLookup for NoValues {
    fn value_at(&self, _cell: CellAddr) -> Option<f64> {
        None
    }
}

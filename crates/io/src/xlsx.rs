//! Workbook loading.
//!
//! A sheet is read twice through calamine: the cached-value range and the
//! formula range. Together they give the two views the audit needs, the
//! text a person typed (formula or literal) and the number the spreadsheet
//! last computed.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use qtyaudit_engine::{CellAddr, ValueLookup};
use qtyaudit_recon::AuditError;

/// Preferred sheet name in landscape facility workbooks.
pub const PREFERRED_SHEET: &str = "시설물산출";

/// Both views of one worksheet. Coordinates are zero-based and absolute.
#[derive(Debug, Clone)]
pub struct SheetSnapshot {
    pub name: String,
    values: Range<Data>,
    formulas: Range<String>,
}

impl SheetSnapshot {
    pub fn new(name: impl Into<String>, values: Range<Data>, formulas: Range<String>) -> Self {
        Self {
            name: name.into(),
            values,
            formulas,
        }
    }

    /// Formula view: `=`-prefixed formula when the cell has one, otherwise
    /// the literal value as text. Trimmed.
    pub fn text_at(&self, row: usize, col: usize) -> String {
        if let Some(formula) = self.formulas.get_value((row as u32, col as u32)) {
            let formula = formula.trim();
            if !formula.is_empty() {
                return if formula.starts_with('=') {
                    formula.to_string()
                } else {
                    format!("={formula}")
                };
            }
        }
        self.values
            .get_value((row as u32, col as u32))
            .map(data_to_text)
            .unwrap_or_default()
    }

    /// Value view: the cached number, with text parsed leniently.
    pub fn number_at(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get_value((row as u32, col as u32)).and_then(data_to_number)
    }

    /// Zero-based index of the last row holding anything in either view.
    pub fn last_row(&self) -> Option<usize> {
        let v = self.values.end().map(|(r, _)| r as usize);
        let f = self.formulas.end().map(|(r, _)| r as usize);
        v.max(f)
    }

    pub fn last_col(&self) -> Option<usize> {
        let v = self.values.end().map(|(_, c)| c as usize);
        let f = self.formulas.end().map(|(_, c)| c as usize);
        v.max(f)
    }

    pub fn is_empty(&self) -> bool {
        self.last_row().is_none()
    }

    /// Formula-view text of the top-left `rows` x `cols` block.
    pub fn text_grid(&self, rows: usize, cols: usize) -> Vec<Vec<String>> {
        let rows = self.last_row().map_or(0, |r| (r + 1).min(rows));
        let cols = self.last_col().map_or(0, |c| (c + 1).min(cols));
        (0..rows)
            .map(|r| (0..cols).map(|c| self.text_at(r, c)).collect())
            .collect()
    }

    /// Every numeric cell of the value view.
    pub fn numeric_cells(&self) -> impl Iterator<Item = (CellAddr, f64)> + '_ {
        let (start_row, start_col) = self.values.start().unwrap_or((0, 0));
        self.values.rows().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().filter_map(move |(c, cell)| {
                data_to_number(cell).map(|n| {
                    (
                        CellAddr::new(start_col as usize + c, start_row as usize + r),
                        n,
                    )
                })
            })
        })
    }
}

impl ValueLookup for SheetSnapshot {
    fn value_at(&self, cell: CellAddr) -> Option<f64> {
        self.number_at(cell.row, cell.col)
    }
}

fn data_to_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Integers without decimals
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{n}"),
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn data_to_number(data: &Data) -> Option<f64> {
    match data {
        Data::Float(n) => Some(*n).filter(|n| n.is_finite()),
        Data::Int(n) => Some(*n as f64),
        Data::String(s) => parse_number(s),
        _ => None,
    }
}

/// Lenient number parsing: thousands separators are dropped and
/// non-finite results rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Pick the quantity sheet: the preferred name if present, else the best
/// scoring name (+2 "시설물", +2 "산출", +1 "수량"), else the first sheet.
pub fn choose_sheet(names: &[String]) -> Option<&str> {
    if let Some(name) = names.iter().find(|n| n.as_str() == PREFERRED_SHEET) {
        return Some(name.as_str());
    }

    let score = |name: &str| {
        let mut s = 0;
        if name.contains("시설물") {
            s += 2;
        }
        if name.contains("산출") {
            s += 2;
        }
        if name.contains("수량") {
            s += 1;
        }
        s
    };

    // Highest score; first sheet wins ties.
    let mut best: Option<(&str, u32)> = None;
    for name in names {
        let s = score(name);
        if s > 0 && best.map_or(true, |(_, b)| s > b) {
            best = Some((name.as_str(), s));
        }
    }
    best.map(|(n, _)| n).or_else(|| names.first().map(String::as_str))
}

/// Open a workbook and snapshot one sheet. With `sheet == None` the sheet
/// is chosen by [`choose_sheet`].
pub fn load_snapshot(path: &Path, sheet: Option<&str>) -> Result<SheetSnapshot, AuditError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AuditError::Workbook(format!("failed to open {}: {e}", path.display())))?;

    let names = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(AuditError::MalformedTable(format!("{} contains no sheets", path.display())));
    }

    let name = match sheet {
        Some(requested) => names
            .iter()
            .find(|n| n.as_str() == requested)
            .cloned()
            .ok_or_else(|| {
                AuditError::MalformedTable(format!(
                    "sheet '{requested}' not found (available: {})",
                    names.join(", ")
                ))
            })?,
        None => choose_sheet(&names).unwrap_or_default().to_string(),
    };
    log::debug!("reading sheet '{name}' from {}", path.display());

    let values = workbook
        .worksheet_range(&name)
        .map_err(|e| AuditError::Workbook(format!("failed to read sheet '{name}': {e}")))?;
    // Formula view is optional: some formats carry no formulas at all.
    let formulas = workbook.worksheet_formula(&name).unwrap_or_else(|e| {
        log::debug!("no formulas for sheet '{name}': {e}");
        Range::empty()
    });

    let snapshot = SheetSnapshot::new(name, values, formulas);
    if snapshot.is_empty() {
        return Err(AuditError::MalformedTable(format!("sheet '{}' is empty", snapshot.name)));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn preferred_sheet_wins() {
        let n = names(&["표지", "시설물 수량산출", "시설물산출"]);
        assert_eq!(choose_sheet(&n), Some("시설물산출"));
    }

    #[test]
    fn best_score_wins() {
        let n = names(&["표지", "수량집계", "시설물 수량산출", "산출"]);
        assert_eq!(choose_sheet(&n), Some("시설물 수량산출"));
    }

    #[test]
    fn score_ties_keep_sheet_order() {
        let n = names(&["표지", "포장 산출", "식재 산출"]);
        assert_eq!(choose_sheet(&n), Some("포장 산출"));
    }

    #[test]
    fn falls_back_to_first_sheet() {
        let n = names(&["Sheet1", "Sheet2"]);
        assert_eq!(choose_sheet(&n), Some("Sheet1"));
        assert_eq!(choose_sheet(&[]), None);
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_number("12"), Some(12.0));
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn text_view_prefers_formula() {
        let mut values = Range::new((0, 0), (0, 1));
        values.set_value((0, 0), Data::Float(6.0));
        values.set_value((0, 1), Data::Float(0.25));
        let mut formulas = Range::new((0, 0), (0, 0));
        formulas.set_value((0, 0), "ROUND(2*3,3)".to_string());

        let snap = SheetSnapshot::new("s", values, formulas);
        assert_eq!(snap.text_at(0, 0), "=ROUND(2*3,3)");
        assert_eq!(snap.text_at(0, 1), "0.25");
        assert_eq!(snap.text_at(5, 5), "");
        assert_eq!(snap.number_at(0, 0), Some(6.0));
        assert_eq!(snap.value_at(CellAddr::new(1, 0)), Some(0.25));
        assert_eq!(snap.last_row(), Some(0));
    }

    #[test]
    fn numeric_cells_use_absolute_positions() {
        let mut values = Range::new((2, 3), (3, 4));
        values.set_value((3, 4), Data::String("1,000".into()));
        values.set_value((2, 3), Data::String("label".into()));
        let snap = SheetSnapshot::new("s", values, Range::empty());
        let cells: Vec<_> = snap.numeric_cells().collect();
        assert_eq!(cells, vec![(CellAddr::new(4, 3), 1000.0)]);
    }
}

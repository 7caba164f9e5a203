//! Header row and column detection.

use qtyaudit_recon::config::ColumnOverrides;
use qtyaudit_recon::{AuditError, ColumnLayout, LineItem};

use crate::xlsx::SheetSnapshot;

pub const HEADER_SCAN_ROWS: usize = 20;
pub const HEADER_SCAN_COLS: usize = 40;

/// Labels named in the missing-header diagnostic.
const HEADER_LABELS: [&str; 6] = ["공종", "규격", "산출근거", "수량", "단위", "비고"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDetection {
    /// 1-based.
    pub header_row: usize,
    pub columns: ColumnLayout,
    /// False when no row qualified.
    pub detected: bool,
}

/// Find the header among the first rows of `grid` (row-major formula-view
/// text). A row qualifies with at least two header labels.
pub fn detect_header(grid: &[Vec<String>]) -> HeaderDetection {
    for (r, row) in grid.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let mut columns = ColumnLayout::default();
        let mut hits = 0;
        for (c, text) in row.iter().take(HEADER_SCAN_COLS).enumerate() {
            let lower = text.to_lowercase();
            if text.contains("공종") {
                columns.work = c;
                hits += 1;
            }
            if text.contains("규격") {
                columns.spec = c;
                hits += 1;
            }
            if text.contains("산출근거") {
                columns.basis = c;
                hits += 1;
            }
            if text.contains("수량") {
                columns.qty = c;
                hits += 1;
            }
            if text.contains("단위") {
                columns.unit = c;
                hits += 1;
            }
            if text.contains("비고") || lower.contains("remark") {
                columns.remarks = c;
                hits += 1;
            }
        }
        if hits >= 2 {
            return HeaderDetection {
                header_row: r + 1,
                columns,
                detected: true,
            };
        }
    }

    HeaderDetection {
        header_row: 1,
        columns: ColumnLayout::default(),
        detected: false,
    }
}

/// Header detection on a snapshot, then manual overrides on top.
///
/// A sheet without a header row is malformed unless `[columns]` pins all six
/// fields, in which case row 1 is taken as the header.
pub fn resolve_layout(snapshot: &SheetSnapshot, overrides: &ColumnOverrides) -> Result<HeaderDetection, AuditError> {
    let mut detection = detect_header(&snapshot.text_grid(HEADER_SCAN_ROWS, HEADER_SCAN_COLS));
    if !detection.detected {
        if !overrides.is_complete() {
            return Err(AuditError::MalformedTable(format!(
                "sheet '{}': no header row with at least 2 of {} in the first {HEADER_SCAN_ROWS} rows",
                snapshot.name,
                HEADER_LABELS.join("/"),
            )));
        }
        log::debug!("no header row found in '{}', using [columns] with header row 1", snapshot.name);
    }
    detection.columns = overrides.apply(detection.columns)?;
    Ok(detection)
}

/// One [`LineItem`] per sheet row below the header, through the last used row.
pub fn extract_items(snapshot: &SheetSnapshot, header_row: usize, columns: &ColumnLayout) -> Vec<LineItem> {
    let Some(last) = snapshot.last_row() else {
        return Vec::new();
    };
    // header_row is 1-based, so it is also the 0-based index of the first data row.
    (header_row..=last)
        .map(|r| LineItem {
            row: r + 1,
            work_type: snapshot.text_at(r, columns.work),
            specification: snapshot.text_at(r, columns.spec),
            basis_text: snapshot.text_at(r, columns.basis),
            declared_formula: snapshot.text_at(r, columns.qty),
            declared_value: snapshot.number_at(r, columns.qty),
            unit: snapshot.text_at(r, columns.unit),
            remarks: snapshot.text_at(r, columns.remarks),
        })
        .collect()
}

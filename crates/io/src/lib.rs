//! `qtyaudit-io`: workbook loading and report writing around the audit engine.

pub mod columns;
pub mod report;
pub mod xlsx;

use std::path::Path;

use qtyaudit_recon::config::ColumnOverrides;
use qtyaudit_recon::{AuditError, AuditInput};

pub use report::{write_reports, WrittenReports};
pub use xlsx::{load_snapshot, SheetSnapshot};

/// Load a workbook into an [`AuditInput`]: choose the sheet, find the header,
/// apply column overrides and extract every row below the header.
pub fn load_input(path: &Path, sheet: Option<&str>, overrides: &ColumnOverrides) -> Result<AuditInput, AuditError> {
    let snapshot = load_snapshot(path, sheet)?;
    input_from_snapshot(&snapshot, overrides)
}

pub fn input_from_snapshot(snapshot: &SheetSnapshot, overrides: &ColumnOverrides) -> Result<AuditInput, AuditError> {
    let detection = columns::resolve_layout(snapshot, overrides)?;
    let items = columns::extract_items(snapshot, detection.header_row, &detection.columns);
    log::debug!(
        "sheet '{}': header_row={}, columns={:?}, rows={}",
        snapshot.name,
        detection.header_row,
        detection.columns,
        items.len()
    );

    Ok(AuditInput {
        sheet_name: snapshot.name.clone(),
        header_row: detection.header_row,
        columns: detection.columns,
        items,
        values: snapshot.numeric_cells().collect(),
    })
}

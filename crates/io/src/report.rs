//! Report writers: `report.csv` and `report.xlsx`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use qtyaudit_recon::{AuditError, AuditReport, DiscrepancyRecord};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

pub const REPORT_COLUMNS: [&str; 11] = [
    "row",
    "cell",
    "check_type",
    "reason",
    "severity",
    "rule_name",
    "related_formula",
    "actual_value",
    "expected_value",
    "difference",
    "tol",
];

pub const SUMMARY_COLUMNS: [&str; 3] = ["check_type", "severity", "count"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn report_err(e: impl std::fmt::Display) -> AuditError {
    AuditError::Report(e.to_string())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn record_fields(d: &DiscrepancyRecord) -> [String; 11] {
    [
        d.row.to_string(),
        d.cell.clone(),
        d.check_kind.to_string(),
        d.reason.clone(),
        d.severity.to_string(),
        d.rule_name.clone(),
        d.related_expression.clone(),
        optional(d.actual_value),
        optional(d.expected_value),
        optional(d.difference),
        optional(d.tolerance),
    ]
}

/// Write records as CSV, UTF-8 with a BOM so spreadsheet apps pick the
/// right encoding for Korean text.
pub fn write_csv(records: &[DiscrepancyRecord], mut writer: impl Write) -> Result<(), AuditError> {
    writer.write_all(UTF8_BOM).map_err(report_err)?;

    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(REPORT_COLUMNS)
        .map_err(|e| report_err(format!("CSV write error: {e}")))?;
    for d in records {
        csv.write_record(&record_fields(d))
            .map_err(|e| report_err(format!("CSV write error: {e}")))?;
    }
    csv.flush().map_err(|e| report_err(format!("CSV flush error: {e}")))?;
    Ok(())
}

/// Workbook with a `Summary` sheet (counts by check type and severity) and
/// an `Errors` sheet (one row per record).
pub fn write_xlsx(report: &AuditReport, path: &Path) -> Result<(), AuditError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let summary = workbook
        .add_worksheet()
        .set_name("Summary")
        .map_err(|e| report_err(format!("failed to create sheet 'Summary': {e}")))?;
    write_header(summary, &SUMMARY_COLUMNS, &header)?;
    for (i, c) in report.summary.counts.iter().enumerate() {
        let row = i as u32 + 1;
        summary.write_string(row, 0, c.check_kind.as_str()).map_err(report_err)?;
        summary.write_string(row, 1, c.severity.as_str()).map_err(report_err)?;
        summary.write_number(row, 2, c.count as f64).map_err(report_err)?;
    }

    let errors = workbook
        .add_worksheet()
        .set_name("Errors")
        .map_err(|e| report_err(format!("failed to create sheet 'Errors': {e}")))?;
    write_header(errors, &REPORT_COLUMNS, &header)?;
    for (i, d) in report.discrepancies.iter().enumerate() {
        let row = i as u32 + 1;
        errors.write_number(row, 0, d.row as f64).map_err(report_err)?;
        errors.write_string(row, 1, &d.cell).map_err(report_err)?;
        errors.write_string(row, 2, d.check_kind.as_str()).map_err(report_err)?;
        errors.write_string(row, 3, &d.reason).map_err(report_err)?;
        errors.write_string(row, 4, d.severity.as_str()).map_err(report_err)?;
        errors.write_string(row, 5, &d.rule_name).map_err(report_err)?;
        errors.write_string(row, 6, &d.related_expression).map_err(report_err)?;
        let numbers = [d.actual_value, d.expected_value, d.difference, d.tolerance];
        for (offset, value) in numbers.iter().enumerate() {
            if let Some(v) = value {
                errors.write_number(row, 7 + offset as u16, *v).map_err(report_err)?;
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| report_err(format!("failed to save {}: {e}", path.display())))?;
    Ok(())
}

fn write_header(sheet: &mut Worksheet, columns: &[&str], format: &Format) -> Result<(), AuditError> {
    for (c, name) in columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, c as u16, *name, format)
            .map_err(report_err)?;
    }
    Ok(())
}

/// Paths written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReports {
    pub csv: PathBuf,
    pub xlsx: Option<PathBuf>,
}

/// Create `outdir` and write `report.csv` and, unless `skip_xlsx`, `report.xlsx`.
///
/// Both files are written under temporary names and renamed into place only
/// after every write succeeded, so a failure leaves no new report behind.
pub fn write_reports(report: &AuditReport, outdir: &Path, skip_xlsx: bool) -> Result<WrittenReports, AuditError> {
    std::fs::create_dir_all(outdir)
        .map_err(|e| report_err(format!("cannot create {}: {e}", outdir.display())))?;

    let csv = Staged::new(outdir.join("report.csv"), outdir.join("report.csv.tmp"));
    let xlsx = (!skip_xlsx).then(|| Staged::new(outdir.join("report.xlsx"), outdir.join("report.tmp.xlsx")));

    let written = stage(report, &csv, xlsx.as_ref()).and_then(|()| {
        // xlsx first: its rename is the one more likely to fail.
        if let Some(x) = &xlsx {
            x.commit()?;
        }
        csv.commit()
    });
    if let Err(e) = written {
        csv.discard();
        if let Some(x) = &xlsx {
            x.discard();
        }
        return Err(e);
    }

    log::debug!("wrote {}", csv.path.display());
    if let Some(x) = &xlsx {
        log::debug!("wrote {}", x.path.display());
    }
    Ok(WrittenReports {
        csv: csv.path,
        xlsx: xlsx.map(|x| x.path),
    })
}

fn stage(report: &AuditReport, csv: &Staged, xlsx: Option<&Staged>) -> Result<(), AuditError> {
    let file = File::create(&csv.tmp)
        .map_err(|e| report_err(format!("cannot create {}: {e}", csv.tmp.display())))?;
    write_csv(&report.discrepancies, file)?;
    if let Some(x) = xlsx {
        write_xlsx(report, &x.tmp)?;
    }
    Ok(())
}

/// Final path plus the temporary path it is written under.
struct Staged {
    path: PathBuf,
    tmp: PathBuf,
}

impl Staged {
    fn new(path: PathBuf, tmp: PathBuf) -> Self {
        Self { path, tmp }
    }

    fn commit(&self) -> Result<(), AuditError> {
        std::fs::rename(&self.tmp, &self.path)
            .map_err(|e| report_err(format!("cannot move report into {}: {e}", self.path.display())))
    }

    fn discard(&self) {
        let _ = std::fs::remove_file(&self.tmp);
    }
}

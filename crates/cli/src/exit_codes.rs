//! CLI exit code registry.
//!
//! Scripts and CI jobs branch on these values, so they only ever grow.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success (findings alone do not fail a run)               |
//! | 1    | General error                                            |
//! | 2    | Usage error (bad arguments, clap errors)                 |
//! | 40   | Rules file missing, unparsable or invalid                |
//! | 41   | Workbook unreadable, or no usable table inside it        |
//! | 42   | Reports could not be written                             |
//! | 43   | Discrepancies found and `--fail-on-findings` was given   |

use qtyaudit_recon::AuditError;

/// Success.
pub const EXIT_SUCCESS: u8 = 0;

/// General error. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error. clap exits with this on its own.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// Rules file could not be read, parsed or validated.
pub const EXIT_INVALID_CONFIG: u8 = 40;

/// Workbook could not be opened, or the chosen sheet holds no table.
pub const EXIT_WORKBOOK: u8 = 41;

/// `report.csv` / `report.xlsx` / JSON could not be produced.
pub const EXIT_REPORT_WRITE: u8 = 42;

/// At least one discrepancy, with `--fail-on-findings`.
pub const EXIT_FINDINGS: u8 = 43;

/// Exit code for an engine or IO error.
pub fn audit_exit_code(err: &AuditError) -> u8 {
    match err {
        AuditError::ConfigParse(_) | AuditError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        AuditError::MalformedTable(_) | AuditError::Workbook(_) => EXIT_WORKBOOK,
        AuditError::Report(_) => EXIT_REPORT_WRITE,
        AuditError::Io(_) => EXIT_ERROR,
    }
}

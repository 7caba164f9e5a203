use std::fmt;

/// Structural failures that abort a whole audit. Per-row problems
/// (unevaluable text, missing cached values) are never errors.
#[derive(Debug)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad regex, non-positive multiplier, etc.).
    ConfigValidation(String),
    /// Input table is unusable (no sheets, empty sheet, no rows below the header).
    MalformedTable(String),
    /// Workbook could not be opened or read.
    Workbook(String),
    /// Report could not be serialized or written.
    Report(String),
    /// Rules file could not be read.
    Io(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MalformedTable(msg) => write!(f, "malformed input table: {msg}"),
            Self::Workbook(msg) => write!(f, "workbook error: {msg}"),
            Self::Report(msg) => write!(f, "report error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AuditError {}

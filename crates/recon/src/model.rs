use std::collections::HashMap;
use std::fmt;

use qtyaudit_engine::formula::col_to_letters;
use qtyaudit_engine::CellAddr;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One bill-of-quantities row, as read from the formula view of the sheet
/// plus the cached value of the quantity cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItem {
    /// 1-based sheet row number.
    pub row: usize,
    pub work_type: String,
    pub specification: String,
    pub basis_text: String,
    pub declared_formula: String,
    pub declared_value: Option<f64>,
    pub unit: String,
    pub remarks: String,
}

impl LineItem {
    /// True when all six tracked text fields are blank.
    pub fn is_empty(&self) -> bool {
        [
            &self.work_type,
            &self.specification,
            &self.basis_text,
            &self.declared_formula,
            &self.unit,
            &self.remarks,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// Zero-based column positions of the six tracked fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnLayout {
    pub work: usize,
    pub spec: usize,
    pub basis: usize,
    pub qty: usize,
    pub unit: usize,
    pub remarks: usize,
}

impl Default for ColumnLayout {
    /// Columns B through G.
    fn default() -> Self {
        Self {
            work: 1,
            spec: 2,
            basis: 3,
            qty: 4,
            unit: 5,
            remarks: 6,
        }
    }
}

impl ColumnLayout {
    pub fn cell(&self, col: usize, row: usize) -> String {
        format!("{}{}", col_to_letters(col), row)
    }
}

/// Pre-loaded table: ordered rows plus the cached-value view used to
/// resolve `ROUND(cell * k, n)` quantity formulas.
#[derive(Debug, Clone, Default)]
pub struct AuditInput {
    pub sheet_name: String,
    /// 1-based header row; data rows start below it.
    pub header_row: usize,
    pub columns: ColumnLayout,
    pub items: Vec<LineItem>,
    pub values: HashMap<CellAddr, f64>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCategory {
    Material,
    Installation,
    Unknown,
}

impl fmt::Display for RowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material => write!(f, "material"),
            Self::Installation => write!(f, "installation"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Discrepancies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ComputedValue,
    SurchargePolicy,
    SurchargeValue,
    UnitWeight,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComputedValue => "computed_value",
            Self::SurchargePolicy => "surcharge_policy",
            Self::SurchargeValue => "surcharge_value",
            Self::UnitWeight => "unit_weight",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "HIGH", alias = "high")]
    High,
    #[serde(rename = "MEDIUM", alias = "medium")]
    Medium,
    #[serde(rename = "LOW", alias = "low")]
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding. Built once by the engine and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscrepancyRecord {
    pub row: usize,
    pub cell: String,
    pub check_kind: CheckKind,
    pub reason: String,
    pub severity: Severity,
    pub rule_name: String,
    pub related_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl DiscrepancyRecord {
    pub(crate) fn new(
        row: usize,
        cell: String,
        check_kind: CheckKind,
        severity: Severity,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            row,
            cell,
            check_kind,
            reason: reason.into(),
            severity,
            rule_name: String::new(),
            related_expression: String::new(),
            actual_value: None,
            expected_value: None,
            difference: None,
            tolerance: None,
        }
    }

    pub(crate) fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = rule_name.into();
        self
    }

    pub(crate) fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.related_expression = expression.into();
        self
    }

    pub(crate) fn with_values(mut self, actual: f64, expected: f64, tolerance: f64) -> Self {
        self.actual_value = Some(actual);
        self.expected_value = Some(expected);
        self.difference = Some((actual - expected).abs());
        self.tolerance = Some(tolerance);
        self
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCount {
    pub check_kind: CheckKind,
    pub severity: Severity,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub rows_checked: usize,
    pub rows_skipped_empty: usize,
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Sorted by check kind name, then severity name.
    pub counts: Vec<SummaryCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub config_name: String,
    pub policy: String,
    pub sheet_name: String,
    pub header_row: usize,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub meta: AuditMeta,
    pub summary: AuditSummary,
    pub discrepancies: Vec<DiscrepancyRecord>,
}

impl AuditReport {
    pub fn to_json_pretty(&self) -> Result<String, crate::AuditError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::AuditError::Report(format!("JSON serialization error: {e}")))
    }
}

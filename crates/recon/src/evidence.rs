use std::collections::BTreeMap;

use crate::model::{AuditSummary, CheckKind, DiscrepancyRecord, Severity, SummaryCount};

/// Compute summary statistics from the discrepancy list.
pub fn compute_summary(records: &[DiscrepancyRecord], rows_checked: usize, rows_skipped_empty: usize) -> AuditSummary {
    // Keyed by names so the order matches the report's Summary sheet.
    let mut counts: BTreeMap<(&'static str, &'static str), (CheckKind, Severity, usize)> = BTreeMap::new();
    let mut high = 0;
    let mut medium = 0;
    let mut low = 0;

    for r in records {
        counts
            .entry((r.check_kind.as_str(), r.severity.as_str()))
            .or_insert((r.check_kind, r.severity, 0))
            .2 += 1;

        match r.severity {
            Severity::High => high += 1,
            Severity::Medium => medium += 1,
            Severity::Low => low += 1,
        }
    }

    AuditSummary {
        rows_checked,
        rows_skipped_empty,
        total: records.len(),
        high,
        medium,
        low,
        counts: counts
            .into_values()
            .map(|(check_kind, severity, count)| SummaryCount {
                check_kind,
                severity,
                count,
            })
            .collect(),
    }
}

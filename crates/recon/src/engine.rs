use std::collections::BTreeMap;
use std::sync::OnceLock;

use qtyaudit_engine::{evaluate, round_half_away, RoundCall, ToleranceRule, ToleranceSpec, ValueLookup};
use regex::Regex;

use crate::classify::{detect_percentage, KeywordPolicy};
use crate::config::{AuditConfig, SeverityConfig};
use crate::error::AuditError;
use crate::evidence::compute_summary;
use crate::heuristics::unit_weight_issues;
use crate::model::{
    AuditInput, AuditMeta, AuditReport, CheckKind, ColumnLayout, DiscrepancyRecord, LineItem, RowCategory,
    Severity,
};
use crate::policy::{self, SurchargePolicy};
use crate::rules::{percentage_rule_name, select_rule, RowText, StandardRule, SurchargeRule};

/// Run the audit per config. Returns discrepancies in row order plus a summary.
pub fn run(config: &AuditConfig, input: &AuditInput) -> Result<AuditReport, AuditError> {
    let auditor = Auditor::new(config)?;

    if input.items.is_empty() {
        return Err(AuditError::MalformedTable(format!(
            "sheet '{}' has no rows below header row {}",
            input.sheet_name, input.header_row
        )));
    }

    let mut discrepancies = Vec::new();
    let mut rows_checked = 0;
    let mut rows_skipped = 0;

    for item in &input.items {
        if item.is_empty() {
            rows_skipped += 1;
            continue;
        }
        rows_checked += 1;
        discrepancies.extend(auditor.audit_row(item, &input.columns, &input.values));
    }

    let summary = compute_summary(&discrepancies, rows_checked, rows_skipped);
    log::info!(
        "audit '{}': sheet={}, rows_checked={}, skipped_empty={}, discrepancies={} (high={}, medium={}, low={})",
        config.name,
        input.sheet_name,
        summary.rows_checked,
        summary.rows_skipped_empty,
        summary.total,
        summary.high,
        summary.medium,
        summary.low,
    );

    Ok(AuditReport {
        meta: AuditMeta {
            config_name: config.name.clone(),
            policy: auditor.policy_name().to_string(),
            sheet_name: input.sheet_name.clone(),
            header_row: input.header_row,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        discrepancies,
    })
}

// ---------------------------------------------------------------------------
// Auditor
// ---------------------------------------------------------------------------

/// Compiled, immutable view of an [`AuditConfig`].
#[derive(Debug)]
pub struct Auditor {
    keywords: KeywordPolicy,
    percent_pattern: Regex,
    multipliers: BTreeMap<String, f64>,
    standard_rules: Vec<StandardRule>,
    policy: Box<dyn SurchargePolicy>,
    default_digits: i32,
    tolerance: ToleranceRule,
    severity: SeverityConfig,
}

/// What the surcharge checks do for one row.
#[derive(Debug, Clone, PartialEq)]
enum SurchargeOutcome {
    NotApplicable,
    /// Installation row whose remarks carry a percentage.
    InstallationViolation { token: String },
    /// Percentage present but not in the multiplier map.
    Unmapped { token: String },
    /// Material row with a selected rule.
    Apply(SurchargeRule),
}

impl Auditor {
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        config.validate()?;
        Ok(Self {
            keywords: KeywordPolicy::from_config(config),
            percent_pattern: config.percent_regex()?,
            multipliers: config.allowance_multiplier_map.clone(),
            standard_rules: config.standard_rules.iter().map(StandardRule::from_config).collect(),
            policy: policy::from_config(&config.policy),
            default_digits: config.round_default_digits,
            tolerance: config.tolerance,
            severity: config.severity,
        })
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// All checks for one non-empty row, in check-kind order.
    pub fn audit_row(&self, item: &LineItem, columns: &ColumnLayout, values: &dyn ValueLookup) -> Vec<DiscrepancyRecord> {
        let category = self.policy.category(item, &self.keywords);
        let outcome = self.surcharge_outcome(item, category);
        log::debug!("row {}: category={category}, surcharge={outcome:?}", item.row);

        let mut out = Vec::new();
        if let Some(rec) = self.check_computed_value(item, columns, values) {
            out.push(rec);
        }
        match &outcome {
            SurchargeOutcome::NotApplicable => {}
            SurchargeOutcome::InstallationViolation { token } => {
                out.push(self.policy_violation(item, columns, token));
            }
            SurchargeOutcome::Unmapped { token } => {
                out.push(self.unmapped_percentage(item, columns, token));
            }
            SurchargeOutcome::Apply(rule) => {
                out.extend(self.check_surcharge_value(item, columns, values, rule));
            }
        }
        out.extend(unit_weight_issues(&item.work_type, &item.specification, &item.unit).into_iter().map(
            |issue| {
                DiscrepancyRecord::new(
                    item.row,
                    columns.cell(columns.unit, item.row),
                    CheckKind::UnitWeight,
                    issue.severity,
                    issue.reason,
                )
                .with_rule(issue.rule_name)
                .with_expression(format!("work: {} | spec: {} | unit: {}", item.work_type, item.specification, item.unit))
            },
        ));
        out
    }

    fn surcharge_outcome(&self, item: &LineItem, category: RowCategory) -> SurchargeOutcome {
        let text = RowText::new(&item.work_type, &item.specification, &item.unit, &item.remarks);

        let Some(token) = detect_percentage(&item.remarks, &self.percent_pattern) else {
            if !self.policy.checks_without_percentage() || category != RowCategory::Material {
                return SurchargeOutcome::NotApplicable;
            }
            return match select_rule(&self.standard_rules, None, &text) {
                Some(rule) => SurchargeOutcome::Apply(rule),
                None => SurchargeOutcome::NotApplicable,
            };
        };

        if category == RowCategory::Installation {
            return SurchargeOutcome::InstallationViolation { token };
        }
        let Some(&multiplier) = self.multipliers.get(&token) else {
            return SurchargeOutcome::Unmapped { token };
        };
        if category != RowCategory::Material {
            return SurchargeOutcome::NotApplicable;
        }
        match select_rule(&self.standard_rules, Some((&token, multiplier)), &text) {
            Some(rule) => SurchargeOutcome::Apply(rule),
            None => SurchargeOutcome::NotApplicable,
        }
    }

    // -- check kind 1 -------------------------------------------------------

    /// Declared value against the value its own ROUND formula, or failing
    /// that the basis text, implies. Runs on every row, surcharged or not.
    fn check_computed_value(
        &self,
        item: &LineItem,
        columns: &ColumnLayout,
        values: &dyn ValueLookup,
    ) -> Option<DiscrepancyRecord> {
        let declared = item.declared_value?;

        let (expected, spec, rule_name) = match RoundCall::parse(&item.declared_formula) {
            Some(call) => {
                let Some(expected) = call.resolve(values) else {
                    log::debug!("row {}: referenced value unavailable, skipping computed check", item.row);
                    return None;
                };
                (expected, ToleranceSpec::from_digits(call.digits(), &self.tolerance), call.label())
            }
            None => {
                let basis = evaluate(&item.basis_text)?;
                let spec = self.formula_tolerance(&item.declared_formula);
                let expected = round_half_away(basis, spec.digits);
                (expected, spec, format!("basis:ROUND({})", spec.digits))
            }
        };

        if (expected - declared).abs() <= spec.tolerance {
            return None;
        }
        Some(
            DiscrepancyRecord::new(
                item.row,
                format!(
                    "{}/{}",
                    columns.cell(columns.basis, item.row),
                    columns.cell(columns.qty, item.row)
                ),
                CheckKind::ComputedValue,
                Severity::High,
                format!("declared quantity differs from the expected value (ROUND {})", spec.digits),
            )
            .with_rule(rule_name)
            .with_expression(full_expression(item))
            .with_values(declared, expected, spec.tolerance),
        )
    }

    // -- check kind 2 -------------------------------------------------------

    fn policy_violation(&self, item: &LineItem, columns: &ColumnLayout, token: &str) -> DiscrepancyRecord {
        DiscrepancyRecord::new(
            item.row,
            columns.cell(columns.qty, item.row),
            CheckKind::SurchargePolicy,
            self.severity.installation_has_allowance,
            format!("installation item (net quantity) carries a surcharge of {token} in remarks"),
        )
        .with_rule(percentage_rule_name(token))
        .with_expression(full_expression(item))
    }

    // -- check kind 3 -------------------------------------------------------

    fn unmapped_percentage(&self, item: &LineItem, columns: &ColumnLayout, token: &str) -> DiscrepancyRecord {
        DiscrepancyRecord::new(
            item.row,
            columns.cell(columns.remarks, item.row),
            CheckKind::SurchargeValue,
            self.severity.unmapped_percentage,
            format!("remarks mention '{token}' but allowance_multiplier_map has no entry for it"),
        )
        .with_rule("allowance_multiplier_map missing")
        .with_expression(format!("remarks: {} | formula: {}", item.remarks, item.declared_formula))
    }

    fn check_surcharge_value(
        &self,
        item: &LineItem,
        columns: &ColumnLayout,
        values: &dyn ValueLookup,
        rule: &SurchargeRule,
    ) -> Vec<DiscrepancyRecord> {
        let mut out = Vec::new();
        let Some(declared) = item.declared_value else {
            return out;
        };
        let cell = columns.cell(columns.qty, item.row);
        let severity = self.severity.allowance_value;

        if let Some(RoundCall::Scaled { cell: source, multiplier, digits }) = RoundCall::parse(&item.declared_formula) {
            if (multiplier - rule.multiplier).abs() > 1e-9 {
                out.push(
                    DiscrepancyRecord::new(
                        item.row,
                        cell.clone(),
                        CheckKind::SurchargeValue,
                        severity,
                        format!(
                            "formula multiplier {multiplier} differs from the surcharge multiplier {}",
                            rule.multiplier
                        ),
                    )
                    .with_rule(rule.name.clone())
                    .with_expression(format!("formula: {} | remarks: {}", item.declared_formula, item.remarks))
                    .with_values(multiplier, rule.multiplier, 0.0),
                );
            }

            if let Some(value) = values.value_at(source) {
                let expected = round_half_away(value * multiplier, digits);
                let spec = ToleranceSpec::from_digits(digits, &self.tolerance);
                if (expected - declared).abs() > spec.tolerance {
                    out.push(
                        DiscrepancyRecord::new(
                            item.row,
                            cell,
                            CheckKind::SurchargeValue,
                            severity,
                            "material item: declared quantity differs from its referenced formula result",
                        )
                        .with_rule(format!("{} | ref({source})", rule.name))
                        .with_expression(format!("formula: {} | remarks: {}", item.declared_formula, item.remarks))
                        .with_values(declared, expected, spec.tolerance),
                    );
                }
                return out;
            }
            log::debug!("row {}: {source} has no cached value, checking basis instead", item.row);
        }

        let Some(basis) = evaluate(&item.basis_text) else {
            return out;
        };
        let spec = self.formula_tolerance(&item.declared_formula);
        let (expected, rule_name) = if basis_has_multiplier(&item.basis_text, rule.multiplier) {
            (
                round_half_away(basis, spec.digits),
                format!("{} | basis already has {}", rule.name, rule.multiplier),
            )
        } else {
            (
                round_half_away(basis * rule.multiplier, spec.digits),
                format!("{} | basis*{}", rule.name, rule.multiplier),
            )
        };

        if (expected - declared).abs() > spec.tolerance {
            out.push(
                DiscrepancyRecord::new(
                    item.row,
                    cell,
                    CheckKind::SurchargeValue,
                    severity,
                    "material item: declared quantity differs from the surcharged expected value",
                )
                .with_rule(rule_name)
                .with_expression(full_expression(item))
                .with_values(declared, expected, spec.tolerance),
            );
        }
        out
    }

    fn formula_tolerance(&self, formula: &str) -> ToleranceSpec {
        ToleranceSpec::for_formula(formula, self.default_digits, &self.tolerance)
    }
}

fn full_expression(item: &LineItem) -> String {
    format!(
        "basis: {} | formula: {} | remarks: {}",
        item.basis_text, item.declared_formula, item.remarks
    )
}

fn multiplied_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\s*([0-9]+(?:\.[0-9]+)?)").expect("static multiplied literal pattern"))
}

/// True if the basis already multiplies by a literal equal to `multiplier`
/// (`"100*1.04"` for 1.04), so the surcharge must not be applied twice.
pub fn basis_has_multiplier(basis: &str, multiplier: f64) -> bool {
    let cleaned = basis.replace(',', "");
    multiplied_literal()
        .captures_iter(&cleaned)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .any(|factor| (factor - multiplier).abs() < 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtyaudit_engine::{CellAddr, NoValues};
    use std::collections::HashMap;

    fn config() -> AuditConfig {
        AuditConfig::from_toml(
            r#"
material_keywords_any = ["자재", "steel"]
installation_keywords_any = ["설치"]

[allowance_multiplier_map]
"3%" = 1.03
"4%" = 1.04
"#,
        )
        .unwrap()
    }

    fn row(basis: &str, formula: &str, value: Option<f64>, work: &str, remarks: &str) -> LineItem {
        LineItem {
            row: 5,
            work_type: work.into(),
            specification: String::new(),
            basis_text: basis.into(),
            declared_formula: formula.into(),
            declared_value: value,
            unit: "m".into(),
            remarks: remarks.into(),
        }
    }

    fn audit(item: &LineItem) -> Vec<DiscrepancyRecord> {
        Auditor::new(&config()).unwrap().audit_row(item, &ColumnLayout::default(), &NoValues)
    }

    #[test]
    fn basis_multiplier_detection() {
        assert!(basis_has_multiplier("100*1.04", 1.04));
        assert!(basis_has_multiplier("1,000 * 1.04 * 2", 1.04));
        assert!(!basis_has_multiplier("100*1.05", 1.04));
        assert!(!basis_has_multiplier("1.04+100", 1.04));
        assert!(!basis_has_multiplier("", 1.04));
    }

    #[test]
    fn computed_value_cells_and_rule_name() {
        let recs = audit(&row("2*3", "", Some(6.5), "벤치", ""));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].cell, "D5/E5");
        assert_eq!(recs[0].rule_name, "basis:ROUND(3)");
        assert_eq!(recs[0].severity, Severity::High);
        assert!((recs[0].tolerance.unwrap() - 0.0006).abs() < 1e-15);
    }

    #[test]
    fn declared_round_formula_takes_precedence_over_basis() {
        // Basis says 7 but the formula itself is consistent with the value.
        let recs = audit(&row("7", "=ROUND(2*3,0)", Some(6.0), "벤치", ""));
        assert!(recs.is_empty(), "{recs:?}");
    }

    #[test]
    fn missing_reference_skips_computed_check() {
        let recs = audit(&row("100", "=ROUND(E4*1.04,3)", Some(999.0), "벤치", ""));
        assert!(recs.is_empty(), "{recs:?}");
    }

    #[test]
    fn missing_declared_value_skips_numeric_checks() {
        let recs = audit(&row("2*3", "", None, "steel", "4%"));
        assert!(recs.is_empty(), "{recs:?}");
    }

    #[test]
    fn unmapped_percentage_on_material() {
        let recs = audit(&row("100", "", Some(105.0), "steel", "5%"));
        assert_eq!(recs.len(), 2, "{recs:?}");
        // Kind 1 still runs on the basis because no rule was applied.
        assert_eq!(recs[0].check_kind, CheckKind::ComputedValue);
        assert_eq!(recs[1].check_kind, CheckKind::SurchargeValue);
        assert_eq!(recs[1].cell, "G5");
        assert!(recs[1].reason.contains("'5%'"));
    }

    #[test]
    fn installation_with_unmapped_percentage_is_policy_violation() {
        let recs = audit(&row("", "", None, "벤치 설치", "7%"));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].check_kind, CheckKind::SurchargePolicy);
        assert_eq!(recs[0].rule_name, "remarks percentage (7%)");
    }

    #[test]
    fn unknown_row_with_percentage_gets_no_surcharge_check() {
        let recs = audit(&row("100", "", Some(100.0), "벤치", "4%"));
        assert!(recs.is_empty(), "{recs:?}");
    }

    #[test]
    fn computed_check_runs_on_surcharged_rows() {
        let recs = audit(&row("100", "", Some(150.0), "steel", "4%"));
        let kinds: Vec<_> = recs.iter().map(|r| (r.check_kind, r.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (CheckKind::ComputedValue, Severity::High),
                (CheckKind::SurchargeValue, Severity::Medium),
            ]
        );
        assert_eq!(recs[0].expected_value, Some(100.0));
        assert_eq!(recs[0].rule_name, "basis:ROUND(3)");
        assert_eq!(recs[1].expected_value, Some(104.0));
    }

    #[test]
    fn scaled_formula_checks_multiplier_and_result() {
        let mut values = HashMap::new();
        values.insert(CellAddr::new(4, 3), 10.0);
        let item = row("", "=ROUND(E4*1.05,3)", Some(10.4), "steel", "4%");
        let recs = Auditor::new(&config()).unwrap().audit_row(&item, &ColumnLayout::default(), &values);

        let kinds: Vec<_> = recs.iter().map(|r| (r.check_kind, r.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (CheckKind::ComputedValue, Severity::High),
                (CheckKind::SurchargeValue, Severity::Medium),
                (CheckKind::SurchargeValue, Severity::Medium),
            ]
        );
        assert_eq!(recs[1].actual_value, Some(1.05));
        assert_eq!(recs[1].expected_value, Some(1.04));
        assert_eq!(recs[1].tolerance, Some(0.0));
        assert_eq!(recs[2].expected_value, Some(10.5));
        assert_eq!(recs[2].rule_name, "remarks percentage (4%) | ref(E4)");
    }
}

//! Unit and unit-weight sanity checks on single rows.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Severity;

/// One heuristic finding: severity, reason, rule name.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitIssue {
    pub severity: Severity,
    pub reason: &'static str,
    pub rule_name: &'static str,
}

const GALVANIZED_SQUARE_PIPE: &str = "아연도각관";
const DEFORMED_REBAR: &str = "이형철근";

fn plate_thickness() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bT\s*\d+(\.\d+)?\b").expect("static plate thickness pattern"))
}

fn rebar_diameter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bD\s*\d+\b").expect("static rebar diameter pattern"))
}

pub fn unit_weight_issues(work: &str, spec: &str, unit: &str) -> Vec<UnitIssue> {
    let mut issues = Vec::new();
    let item = format!("{work} {spec}");
    let lower = item.to_lowercase();
    let unit = unit.trim().to_lowercase();

    if item.contains(GALVANIZED_SQUARE_PIPE) {
        if unit == "kg" {
            issues.push(UnitIssue {
                severity: Severity::High,
                reason: "galvanized square pipe is priced per metre but the unit is kg",
                rule_name: "unit_weight:galvanized-square-pipe",
            });
        }
        return issues;
    }

    if (lower.contains("st pl") || lower.contains("sts pl")) && !plate_thickness().is_match(spec) {
        issues.push(UnitIssue {
            severity: Severity::Medium,
            reason: "plate item without a thickness (T value) in the specification",
            rule_name: "unit_weight:plate-thickness",
        });
    }

    if lower.contains("angle") && matches!(unit.as_str(), "m" | "m2" | "㎡") {
        issues.push(UnitIssue {
            severity: Severity::Low,
            reason: "angle item measured by length or area; review against 39.65 kg/m2",
            rule_name: "unit_weight:angle-39.65",
        });
    }

    if lower.contains(DEFORMED_REBAR) && !rebar_diameter().is_match(spec) {
        issues.push(UnitIssue {
            severity: Severity::Medium,
            reason: "deformed rebar without a diameter (D value) in the specification",
            rule_name: "unit_weight:rebar-diameter",
        });
    }

    issues
}

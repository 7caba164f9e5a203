use std::collections::BTreeMap;
use std::path::Path;

use qtyaudit_engine::formula::letters_to_col;
use qtyaudit_engine::{ToleranceRule, DEFAULT_ROUND_DIGITS};
use regex::Regex;
use serde::Deserialize;

use crate::error::AuditError;
use crate::model::{ColumnLayout, Severity};

pub const DEFAULT_PERCENT_PATTERN: &str = r"(\d+(\.\d+)?)%";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Audit rules. Every key is optional; a missing key takes the default
/// shown in `rules.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub name: String,
    pub material_keywords_any: Vec<String>,
    pub installation_keywords_any: Vec<String>,
    pub allowance_percent_extract_regex: String,
    /// Percentage token (`"4%"`) to multiplier (`1.04`).
    pub allowance_multiplier_map: BTreeMap<String, f64>,
    pub round_default_digits: i32,
    pub tolerance: ToleranceRule,
    pub policy: PolicyConfig,
    pub severity: SeverityConfig,
    pub standard_rules: Vec<StandardRuleConfig>,
    pub columns: ColumnOverrides,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            name: "qty-audit".into(),
            material_keywords_any: Vec::new(),
            installation_keywords_any: Vec::new(),
            allowance_percent_extract_regex: DEFAULT_PERCENT_PATTERN.into(),
            allowance_multiplier_map: BTreeMap::new(),
            round_default_digits: DEFAULT_ROUND_DIGITS,
            tolerance: ToleranceRule::default(),
            policy: PolicyConfig::default(),
            severity: SeverityConfig::default(),
            standard_rules: Vec::new(),
            columns: ColumnOverrides::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub kind: PolicyKind,
    /// Work names treated as installation by `fixed_name_exclusion`.
    pub excluded_work_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    PercentGated,
    AlwaysCheck,
    FixedNameExclusion,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PercentGated => write!(f, "percent_gated"),
            Self::AlwaysCheck => write!(f, "always_check"),
            Self::FixedNameExclusion => write!(f, "fixed_name_exclusion"),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity overrides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityConfig {
    pub installation_has_allowance: Severity,
    pub allowance_value: Severity,
    pub unmapped_percentage: Severity,
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            installation_has_allowance: Severity::High,
            allowance_value: Severity::Medium,
            unmapped_percentage: Severity::Medium,
        }
    }
}

// ---------------------------------------------------------------------------
// Standard keyword rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandardRuleConfig {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    pub multiplier: f64,
    pub keywords_any: Vec<String>,
    /// Checked against work type + remarks only.
    #[serde(default)]
    pub require_any: Vec<String>,
}

// ---------------------------------------------------------------------------
// Column overrides
// ---------------------------------------------------------------------------

/// Column letters that override header detection, field by field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnOverrides {
    pub work: Option<String>,
    pub spec: Option<String>,
    pub basis: Option<String>,
    pub qty: Option<String>,
    pub unit: Option<String>,
    pub remarks: Option<String>,
}

impl ColumnOverrides {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// True when every field is pinned, so no header is needed.
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_some())
    }

    /// Apply the overrides on top of a detected layout.
    pub fn apply(&self, mut layout: ColumnLayout) -> Result<ColumnLayout, AuditError> {
        for (field, letters) in self.fields() {
            let Some(letters) = letters else { continue };
            let col = column_index(field, letters)?;
            match field {
                "work" => layout.work = col,
                "spec" => layout.spec = col,
                "basis" => layout.basis = col,
                "qty" => layout.qty = col,
                "unit" => layout.unit = col,
                _ => layout.remarks = col,
            }
        }
        Ok(layout)
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("work", self.work.as_deref()),
            ("spec", self.spec.as_deref()),
            ("basis", self.basis.as_deref()),
            ("qty", self.qty.as_deref()),
            ("unit", self.unit.as_deref()),
            ("remarks", self.remarks.as_deref()),
        ]
    }
}

fn column_index(field: &str, letters: &str) -> Result<usize, AuditError> {
    let trimmed = letters.trim();
    let col = if trimmed.len() <= 3 { letters_to_col(trimmed) } else { None };
    col.ok_or_else(|| {
        AuditError::ConfigValidation(format!(
            "columns.{field}: '{letters}' is not a column letter (A..XFD)"
        ))
    })
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AuditConfig {
    /// Read, parse and validate a rules file.
    pub fn from_file(path: &Path) -> Result<Self, AuditError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        self.percent_regex()?;

        for (token, multiplier) in &self.allowance_multiplier_map {
            check_multiplier(&format!("allowance_multiplier_map['{token}']"), *multiplier)?;
        }

        if self.round_default_digits.abs() > 15 {
            return Err(AuditError::ConfigValidation(format!(
                "round_default_digits must be within -15..=15, got {}",
                self.round_default_digits
            )));
        }

        let tol = &self.tolerance;
        if !tol.factor.is_finite() || tol.factor <= 0.0 {
            return Err(AuditError::ConfigValidation(format!(
                "tolerance.factor must be > 0, got {}",
                tol.factor
            )));
        }
        if !tol.floor.is_finite() || tol.floor <= 0.0 {
            return Err(AuditError::ConfigValidation(format!(
                "tolerance.floor must be > 0, got {}",
                tol.floor
            )));
        }

        for (i, rule) in self.standard_rules.iter().enumerate() {
            let label = if rule.name.trim().is_empty() {
                return Err(AuditError::ConfigValidation(format!(
                    "standard_rules[{i}]: name must not be empty"
                )));
            } else {
                format!("standard_rules '{}'", rule.name)
            };
            check_multiplier(&label, rule.multiplier)?;
            if rule.keywords_any.iter().all(|k| k.trim().is_empty()) {
                return Err(AuditError::ConfigValidation(format!(
                    "{label}: keywords_any must contain at least one keyword"
                )));
            }
        }

        self.columns.apply(ColumnLayout::default())?;

        Ok(())
    }

    /// Compiled percentage pattern. Must carry at least one capture group.
    pub fn percent_regex(&self) -> Result<Regex, AuditError> {
        let re = Regex::new(&self.allowance_percent_extract_regex).map_err(|e| {
            AuditError::ConfigValidation(format!("allowance_percent_extract_regex: {e}"))
        })?;
        if re.captures_len() < 2 {
            return Err(AuditError::ConfigValidation(
                "allowance_percent_extract_regex must contain a capture group".into(),
            ));
        }
        Ok(re)
    }
}

fn check_multiplier(label: &str, multiplier: f64) -> Result<(), AuditError> {
    if multiplier.is_finite() && multiplier > 0.0 {
        Ok(())
    } else {
        Err(AuditError::ConfigValidation(format!(
            "{label}: multiplier must be > 0, got {multiplier}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

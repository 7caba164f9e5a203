//! Surcharge policy strategies.
//!
//! A policy decides two things per row: the row category used by the
//! surcharge checks, and whether those checks run when the remarks carry no
//! percentage.

use std::collections::HashSet;

use crate::classify::{classify, KeywordPolicy};
use crate::config::{PolicyConfig, PolicyKind};
use crate::model::{LineItem, RowCategory};

pub trait SurchargePolicy: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn category(&self, item: &LineItem, keywords: &KeywordPolicy) -> RowCategory;

    /// Whether keyword rules may apply to a row without a remarks percentage.
    fn checks_without_percentage(&self) -> bool {
        false
    }
}

/// Surcharge checks only on rows whose remarks carry a percentage.
#[derive(Debug, Default)]
pub struct PercentGatedPolicy;

impl SurchargePolicy for PercentGatedPolicy {
    fn name(&self) -> &'static str {
        "percent_gated"
    }

    fn category(&self, item: &LineItem, keywords: &KeywordPolicy) -> RowCategory {
        keyword_category(item, keywords)
    }
}

/// Surcharge checks on every row; keyword rules select a multiplier even
/// when the remarks are silent.
#[derive(Debug, Default)]
pub struct AlwaysCheckPolicy;

impl SurchargePolicy for AlwaysCheckPolicy {
    fn name(&self) -> &'static str {
        "always_check"
    }

    fn category(&self, item: &LineItem, keywords: &KeywordPolicy) -> RowCategory {
        keyword_category(item, keywords)
    }

    fn checks_without_percentage(&self) -> bool {
        true
    }
}

/// Percent-gated, but installation rows are the ones whose work type is on
/// a fixed list. Installation keywords are not consulted.
#[derive(Debug, Default)]
pub struct FixedNameExclusionPolicy {
    names: HashSet<String>,
}

impl FixedNameExclusionPolicy {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names
                .iter()
                .map(|n| normalize_name(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, work_type: &str) -> bool {
        self.names.contains(&normalize_name(work_type))
    }
}

impl SurchargePolicy for FixedNameExclusionPolicy {
    fn name(&self) -> &'static str {
        "fixed_name_exclusion"
    }

    fn category(&self, item: &LineItem, keywords: &KeywordPolicy) -> RowCategory {
        if self.is_excluded(&item.work_type) {
            return RowCategory::Installation;
        }
        let text = crate::classify::row_text(&item.work_type, &item.specification, &item.unit, &item.remarks);
        if keywords.is_material(&text) {
            RowCategory::Material
        } else {
            RowCategory::Unknown
        }
    }
}

/// Lower-cased with all whitespace removed: `"수목 식재"` equals `"수목식재"`.
fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

fn keyword_category(item: &LineItem, keywords: &KeywordPolicy) -> RowCategory {
    classify(&item.work_type, &item.specification, &item.unit, &item.remarks, keywords)
}

pub fn from_config(config: &PolicyConfig) -> Box<dyn SurchargePolicy> {
    match config.kind {
        PolicyKind::PercentGated => Box::new(PercentGatedPolicy),
        PolicyKind::AlwaysCheck => Box::new(AlwaysCheckPolicy),
        PolicyKind::FixedNameExclusion => {
            Box::new(FixedNameExclusionPolicy::new(&config.excluded_work_names))
        }
    }
}

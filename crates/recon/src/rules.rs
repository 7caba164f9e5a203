//! Surcharge rule selection.
//!
//! Candidates are the implicit remarks-percentage rule (when the remarks
//! carry a mapped percentage) and the configured keyword rules. At most one
//! rule applies to a row: the highest priority wins and ties go to the rule
//! declared first. The implicit rule always sits in the top tier, so a
//! percentage written in the remarks beats any keyword rule.

use crate::classify::contains_any;
use crate::config::StandardRuleConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    RemarksPercentage { token: String },
    Standard,
}

/// The rule selected for a row.
#[derive(Debug, Clone, PartialEq)]
pub struct SurchargeRule {
    pub name: String,
    pub priority: i64,
    pub multiplier: f64,
    pub source: RuleSource,
}

/// Keyword rule with its terms lower-cased once.
#[derive(Debug, Clone)]
pub struct StandardRule {
    pub name: String,
    pub priority: i64,
    pub multiplier: f64,
    keywords_any: Vec<String>,
    require_any: Vec<String>,
}

impl StandardRule {
    pub fn from_config(rule: &StandardRuleConfig) -> Self {
        let lower = |terms: &[String]| {
            terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            name: rule.name.clone(),
            priority: rule.priority,
            multiplier: rule.multiplier,
            keywords_any: lower(&rule.keywords_any),
            require_any: lower(&rule.require_any),
        }
    }

    pub fn matches(&self, text: &RowText) -> bool {
        contains_any(&text.full, &self.keywords_any)
            && (self.require_any.is_empty() || contains_any(&text.scoped, &self.require_any))
    }
}

/// Lower-cased row text in the two scopes rules look at.
#[derive(Debug, Clone)]
pub struct RowText {
    /// work, specification, unit and remarks.
    pub full: String,
    /// work and remarks only.
    pub scoped: String,
}

impl RowText {
    pub fn new(work: &str, spec: &str, unit: &str, remarks: &str) -> Self {
        Self {
            full: crate::classify::row_text(work, spec, unit, remarks),
            scoped: format!("{work} {remarks}").to_lowercase(),
        }
    }
}

pub fn percentage_rule_name(token: &str) -> String {
    format!("remarks percentage ({token})")
}

/// Pick at most one rule for a row.
///
/// `percentage` is the detected remarks token with its mapped multiplier,
/// when the token is in the multiplier map.
pub fn select_rule(
    standard: &[StandardRule],
    percentage: Option<(&str, f64)>,
    text: &RowText,
) -> Option<SurchargeRule> {
    let top_tier = standard
        .iter()
        .map(|r| r.priority)
        .max()
        .unwrap_or(0)
        .saturating_add(1);

    let implicit = percentage.map(|(token, multiplier)| SurchargeRule {
        name: percentage_rule_name(token),
        priority: top_tier,
        multiplier,
        source: RuleSource::RemarksPercentage {
            token: token.to_string(),
        },
    });

    let keyword = standard.iter().filter(|r| r.matches(text)).map(|r| SurchargeRule {
        name: r.name.clone(),
        priority: r.priority,
        multiplier: r.multiplier,
        source: RuleSource::Standard,
    });

    let mut best: Option<SurchargeRule> = None;
    for candidate in implicit.into_iter().chain(keyword) {
        // Strict comparison keeps the earlier candidate on ties.
        if best.as_ref().map_or(true, |b| candidate.priority > b.priority) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, priority: i64, multiplier: f64, keywords: &[&str], require: &[&str]) -> StandardRule {
        StandardRule::from_config(&StandardRuleConfig {
            name: name.into(),
            priority,
            multiplier,
            keywords_any: keywords.iter().map(|s| s.to_string()).collect(),
            require_any: require.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn no_candidates() {
        let text = RowText::new("벤치", "", "EA", "");
        assert_eq!(select_rule(&[], None, &text), None);
        let rules = [rule("steel", 1, 1.05, &["steel"], &[])];
        assert_eq!(select_rule(&rules, None, &text), None);
    }

    #[test]
    fn implicit_percentage_rule() {
        let text = RowText::new("강관", "", "m", "할증 4%");
        let selected = select_rule(&[], Some(("4%", 1.04)), &text).unwrap();
        assert_eq!(selected.name, "remarks percentage (4%)");
        assert_eq!(selected.multiplier, 1.04);
        assert_eq!(selected.source, RuleSource::RemarksPercentage { token: "4%".into() });
    }

    #[test]
    fn implicit_rule_outranks_keyword_rules() {
        let rules = [rule("steel", 100, 1.05, &["steel"], &[])];
        let text = RowText::new("steel pipe", "", "m", "3%");
        let selected = select_rule(&rules, Some(("3%", 1.03)), &text).unwrap();
        assert_eq!(selected.multiplier, 1.03);
    }

    #[test]
    fn highest_priority_wins() {
        let rules = [
            rule("low", 1, 1.02, &["steel"], &[]),
            rule("high", 5, 1.05, &["pipe"], &[]),
        ];
        let text = RowText::new("steel pipe", "", "m", "");
        assert_eq!(select_rule(&rules, None, &text).unwrap().name, "high");
    }

    #[test]
    fn ties_go_to_first_declared() {
        let rules = [
            rule("first", 3, 1.02, &["steel"], &[]),
            rule("second", 3, 1.05, &["steel"], &[]),
        ];
        let text = RowText::new("steel", "", "", "");
        assert_eq!(select_rule(&rules, None, &text).unwrap().name, "first");
    }

    #[test]
    fn require_any_is_scoped_to_work_and_remarks() {
        let rules = [rule("steel loss", 1, 1.05, &["steel"], &["할증"])];

        let in_remarks = RowText::new("steel", "", "m", "할증 대상");
        assert!(select_rule(&rules, None, &in_remarks).is_some());

        // Present only in the specification: does not count.
        let in_spec = RowText::new("steel", "할증", "m", "");
        assert!(select_rule(&rules, None, &in_spec).is_none());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let rules = [rule("steel", 1, 1.05, &["STEEL"], &[])];
        let text = RowText::new("Steel Pipe", "", "", "");
        assert!(select_rule(&rules, None, &text).is_some());
    }
}

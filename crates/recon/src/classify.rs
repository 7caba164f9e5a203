//! Row classification and remarks percentage detection.

use regex::Regex;

use crate::config::AuditConfig;
use crate::model::RowCategory;

/// Lower-cased keyword lists for the two row categories.
#[derive(Debug, Clone, Default)]
pub struct KeywordPolicy {
    material: Vec<String>,
    installation: Vec<String>,
}

impl KeywordPolicy {
    pub fn new<S: AsRef<str>>(material: &[S], installation: &[S]) -> Self {
        Self {
            material: lowered(material),
            installation: lowered(installation),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(&config.material_keywords_any, &config.installation_keywords_any)
    }

    pub fn is_material(&self, text: &str) -> bool {
        contains_any(text, &self.material)
    }

    pub fn is_installation(&self, text: &str) -> bool {
        contains_any(text, &self.installation)
    }
}

fn lowered<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    keys.iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// `text` must already be lower-cased.
pub(crate) fn contains_any(text: &str, keys: &[String]) -> bool {
    keys.iter().any(|k| text.contains(k.as_str()))
}

/// Lower-cased `"{work} {spec} {unit} {remarks}"`.
pub fn row_text(work: &str, spec: &str, unit: &str, remarks: &str) -> String {
    format!("{work} {spec} {unit} {remarks}").to_lowercase()
}

/// Material keywords win over installation keywords.
pub fn classify(work: &str, spec: &str, unit: &str, remarks: &str, keywords: &KeywordPolicy) -> RowCategory {
    let text = row_text(work, spec, unit, remarks);
    if keywords.is_material(&text) {
        RowCategory::Material
    } else if keywords.is_installation(&text) {
        RowCategory::Installation
    } else {
        RowCategory::Unknown
    }
}

/// First capture group of `pattern` in `remarks`, with a `%` suffix.
/// `"자재할증 4%"` → `Some("4%")`.
pub fn detect_percentage(remarks: &str, pattern: &Regex) -> Option<String> {
    let caps = pattern.captures(remarks)?;
    let number = caps.get(1)?.as_str();
    Some(format!("{number}%"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PERCENT_PATTERN;

    fn keywords() -> KeywordPolicy {
        KeywordPolicy::new(&["자재", "Steel"], &["설치", "식재"])
    }

    #[test]
    fn material_keyword() {
        assert_eq!(classify("steel pipe", "", "m", "", &keywords()), RowCategory::Material);
        assert_eq!(classify("STEEL", "", "", "", &keywords()), RowCategory::Material);
    }

    #[test]
    fn material_beats_installation() {
        assert_eq!(classify("강관 설치", "자재", "m", "", &keywords()), RowCategory::Material);
    }

    #[test]
    fn installation_keyword_in_remarks() {
        assert_eq!(classify("수목", "H2.0", "주", "식재 4%", &keywords()), RowCategory::Installation);
    }

    #[test]
    fn no_keywords_is_unknown() {
        assert_eq!(classify("벤치", "", "EA", "", &keywords()), RowCategory::Unknown);
        let none = KeywordPolicy::default();
        assert_eq!(classify("steel", "", "", "", &none), RowCategory::Unknown);
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let k = KeywordPolicy::new(&["", "  "], &[] as &[&str]);
        assert_eq!(classify("anything", "", "", "", &k), RowCategory::Unknown);
    }

    #[test]
    fn percentage_detection() {
        let re = Regex::new(DEFAULT_PERCENT_PATTERN).unwrap();
        assert_eq!(detect_percentage("자재할증 4%", &re).as_deref(), Some("4%"));
        assert_eq!(detect_percentage("3.5% loss, then 4%", &re).as_deref(), Some("3.5%"));
        assert_eq!(detect_percentage("할증 없음", &re), None);
        assert_eq!(detect_percentage("", &re), None);
    }
}

//! Unit discovery for amount fields.
//!
//! Units are attached as metadata, never folded into the value: a row's unit
//! is taken from (a) the value's own element, else (b) the nearest preceding
//! header-level declaration, else (c) a document-level declaration. The
//! search order here implements (a); the grouping layer drives (b) and (c).

use lazy_static::lazy_static;
use regex::Regex;

/// Source of the units recognized in value and header contexts.
pub const UNIT_PATTERN: &str = "百万元|千万元|万元|亿元|千元|元/股|万股|亿股|万份|亿份|元|股|份|%|倍";

lazy_static! {
    static ref DECLARED_UNIT: Regex =
        Regex::new(&format!(r"单位[:：]\s*(?P<dst>{UNIT_PATTERN})")).unwrap();
    static ref BRACKET_UNIT: Regex =
        Regex::new(&format!(r"[(（](?P<dst>{UNIT_PATTERN})[)）]")).unwrap();
    static ref TRAILING_UNIT: Regex =
        Regex::new(&format!(r"\d\s*(?P<dst>{UNIT_PATTERN})")).unwrap();
}

/// Find a unit declared in free text (`单位：万元`, `金额（万元）`, `100万元`).
///
/// Declaration forms win over incidental trailing units.
pub fn find_unit(text: &str) -> Option<String> {
    for pattern in [&*DECLARED_UNIT, &*BRACKET_UNIT, &*TRAILING_UNIT] {
        if let Some(caps) = pattern.captures(text) {
            return Some(caps["dst"].to_string());
        }
    }
    None
}

/// Find an explicitly declared unit only (`单位：万元` or a bracketed header
/// unit), ignoring units that merely trail a number.
pub fn find_declared_unit(text: &str) -> Option<String> {
    for pattern in [&*DECLARED_UNIT, &*BRACKET_UNIT] {
        if let Some(caps) = pattern.captures(text) {
            return Some(caps["dst"].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_declared_unit_wins() {
        assert_eq!(find_unit("单位：万元 金额100元").as_deref(), Some("万元"));
    }

    #[test]
    fn test_bracket_unit() {
        assert_eq!(find_unit("担保金额（万元）").as_deref(), Some("万元"));
    }

    #[test]
    fn test_trailing_unit() {
        assert_eq!(find_unit("合计1,000万元").as_deref(), Some("万元"));
        assert_eq!(find_declared_unit("合计1,000万元"), None);
    }

    #[test]
    fn test_longest_unit_preferred() {
        // 万元 must not be read as 元.
        assert_eq!(find_unit("金额（万元）").as_deref(), Some("万元"));
    }
}

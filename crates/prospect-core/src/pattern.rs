//! Ordered regex collections compiled once at config load.
//!
//! Every pattern that reaches the engine (from a predictor config or from a
//! built-in table) lives in a [`PatternSet`]: an ordered list of compiled
//! regexes where earlier patterns take priority. Compilation happens exactly
//! once, so repeated extractions over the same config share immutable,
//! thread-safe state.

use regex::Regex;

use crate::error::ConfigError;

/// Name of the capture group that carries the extracted value.
pub const DST_GROUP: &str = "dst";

/// Name of the capture group used by anchor content regexes.
pub const CONTENT_GROUP: &str = "content";

/// An ordered collection of compiled regexes.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

/// A single regex match with the pattern priority that produced it.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Matched text: the `dst` group when present, the full match otherwise.
    pub text: String,
    /// Byte span of the matched text in the haystack.
    pub span: (usize, usize),
    /// Index of the pattern in the set (earlier = higher priority).
    pub priority: usize,
}

impl PatternSet {
    /// Compile an ordered list of pattern sources.
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(sources.len());
        for source in sources {
            let source = source.as_ref();
            let regex = Regex::new(source).map_err(|err| ConfigError::MalformedRegex {
                pattern: source.to_string(),
                reason: err.to_string(),
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// A set holding a single already-compiled regex.
    pub fn from_regex(regex: Regex) -> Self {
        Self { patterns: vec![regex] }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Regex> {
        self.patterns.iter()
    }

    /// Whether any pattern matches the text.
    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// First match in pattern order, capturing the `dst` group when present.
    pub fn first_match(&self, text: &str) -> Option<PatternMatch> {
        for (priority, pattern) in self.patterns.iter().enumerate() {
            if let Some(found) = capture_dst(pattern, text) {
                return Some(PatternMatch {
                    text: found.0,
                    span: found.1,
                    priority,
                });
            }
        }
        None
    }

    /// All matches of all patterns, in pattern order then text order.
    /// Duplicate spans (the same text matched by a later pattern) are dropped.
    pub fn all_matches(&self, text: &str) -> Vec<PatternMatch> {
        let mut seen = Vec::new();
        let mut matches = Vec::new();
        for (priority, pattern) in self.patterns.iter().enumerate() {
            for caps in pattern.captures_iter(text) {
                let group = caps
                    .name(DST_GROUP)
                    .or_else(|| caps.get(0))
                    .expect("regex match has group 0");
                let span = (group.start(), group.end());
                if seen.contains(&span) {
                    continue;
                }
                seen.push(span);
                matches.push(PatternMatch {
                    text: group.as_str().to_string(),
                    span,
                    priority,
                });
            }
        }
        matches
    }

    /// Capture the named `content` group of the first matching pattern.
    pub fn content_capture(&self, text: &str) -> Option<PatternMatch> {
        for (priority, pattern) in self.patterns.iter().enumerate() {
            if let Some(caps) = pattern.captures(text) {
                let group = caps.name(CONTENT_GROUP).or_else(|| caps.get(0))?;
                return Some(PatternMatch {
                    text: group.as_str().to_string(),
                    span: (group.start(), group.end()),
                    priority,
                });
            }
        }
        None
    }
}

/// Run one regex over the text, capturing `dst` when the group is defined.
pub fn capture_dst(pattern: &Regex, text: &str) -> Option<(String, (usize, usize))> {
    let caps = pattern.captures(text)?;
    let group = caps.name(DST_GROUP).or_else(|| caps.get(0))?;
    Some((group.as_str().to_string(), (group.start(), group.end())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_match_prefers_earlier_pattern() {
        let set = PatternSet::compile(&[r"代码[:：](?P<dst>\d{6})", r"(?P<dst>\d{6})"]).unwrap();
        let found = set.first_match("公司代码:600001").unwrap();
        assert_eq!(found.text, "600001");
        assert_eq!(found.priority, 0);
    }

    #[test]
    fn test_full_match_when_dst_absent() {
        let set = PatternSet::compile(&[r"\d{4}"]).unwrap();
        let found = set.first_match("编号1234尾部").unwrap();
        assert_eq!(found.text, "1234");
    }

    #[test]
    fn test_all_matches_deduplicates_spans() {
        let set = PatternSet::compile(&[r"(?P<dst>\d+)元", r"(?P<dst>\d+)"]).unwrap();
        let matches = set.all_matches("100元和200元");
        let texts: Vec<_> = matches.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["100", "200"]);
    }

    #[test]
    fn test_malformed_pattern_is_config_error() {
        let err = PatternSet::compile(&["("]).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedRegex { .. }));
    }
}

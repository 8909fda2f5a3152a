//! Regex scanning over running text.
//!
//! The workhorse resolver: walk paragraph elements in document order and
//! pull the `dst` capture of the first (or every) matching regex.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::{Element, ElementClass};
use crate::error::ConfigError;
use crate::normalize::text::{clean_text, sentence_containing};
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, ElementFilter, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

/// Built-in answer regexes for the date-flavored aliases
/// (`re_buy_date`, `extra_date_info`).
pub const DATE_ANSWER_REGS: &[&str] = &[
    r"(?P<dst>\d{4}年\d{1,2}月\d{1,2}日)",
    r"(?P<dst>\d{4}[-/.]\d{1,2}[-/.]\d{1,2})",
    r"(?P<dst>[〇零一二三四五六七八九]{4}年十?[一二三四五六七八九十]月(?:[一二三四五六七八九十]{1,3}日)?)",
];

#[derive(Debug)]
pub struct PartialText {
    regs: PatternSet,
    /// Element classes to scan; empty = paragraphs only.
    target_element: Vec<ElementClass>,
    /// Optional `[start, end)` element position window.
    position_range: Vec<i64>,
    multi: bool,
    multi_elements: bool,
    /// Derive a default answer regex from the field name when `regs` is
    /// empty.
    use_answer_pattern: bool,
    /// Drop matches whose containing sentence matches any of these.
    neglect_patterns: PatternSet,
    /// Try each regex across all elements before failing over to the next.
    model_alternative: bool,
}

impl PartialText {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
        preset_regs: Option<&[&str]>,
    ) -> Result<Self, ConfigError> {
        let mut regs = reader.patterns("regs")?;
        if regs.is_empty() {
            if let Some(preset) = preset_regs {
                regs = PatternSet::compile(preset)?;
            }
        }
        Ok(Self {
            regs,
            target_element: parse_classes(&reader.str_list("target_element")),
            position_range: reader.i64_list("position_range"),
            multi: reader.bool("multi", defaults.multi),
            multi_elements: reader.bool("multi_elements", defaults.multi_elements),
            use_answer_pattern: reader.bool("use_answer_pattern", true),
            neglect_patterns: reader.patterns("neglect_patterns")?,
            model_alternative: reader.bool("model_alternative", false),
        })
    }

    pub fn resolve(
        &self,
        ctx: FieldContext<'_>,
        index: &ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<Candidate> {
        let regs = match self.effective_regs(ctx) {
            Some(regs) => regs,
            None => {
                debug!(field = ctx.name, "partial_text has no patterns to apply");
                return Vec::new();
            }
        };

        let elements: Vec<&Element> = index
            .iter()
            .filter(|e| self.in_position_range(e.index))
            .filter(|e| self.is_target(e))
            .filter(|e| filter.keep(e, index))
            .collect();

        if self.model_alternative {
            // Each regex sweeps the whole document before the next is tried.
            for (priority, regex) in regs.iter().enumerate() {
                let single = PatternSet::from_regex(regex.clone());
                let candidates = self.scan(&elements, &single, priority);
                if !candidates.is_empty() {
                    return candidates;
                }
            }
            Vec::new()
        } else {
            self.scan(&elements, &regs, 0)
        }
    }

    fn scan(&self, elements: &[&Element], regs: &PatternSet, base_priority: usize) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for element in elements {
            let text = clean_text(&element.text);
            let matches = if self.multi_elements {
                regs.all_matches(&text)
            } else {
                regs.first_match(&text).into_iter().collect()
            };
            let mut hit = false;
            for found in matches {
                if !self.neglect_patterns.is_empty()
                    && self.neglect_patterns.is_match(sentence_containing(&text, found.span))
                {
                    debug!(element = element.index, "match dropped by neglect_patterns");
                    continue;
                }
                hit = true;
                candidates.push(
                    Candidate::from_text(found.text, element.index)
                        .with_span(found.span)
                        .with_priority(base_priority + found.priority),
                );
            }
            if hit && !self.multi {
                break;
            }
        }
        candidates
    }

    fn effective_regs(&self, ctx: FieldContext<'_>) -> Option<PatternSet> {
        if !self.regs.is_empty() {
            return Some(self.regs.clone());
        }
        if !self.use_answer_pattern {
            return None;
        }
        // Default answer pattern: `<field name>: <value>` up to sentence end.
        let source = format!(
            r"{}[为:：]\s*(?P<dst>.+?)(?:[。；;.]|$)",
            regex::escape(ctx.name)
        );
        PatternSet::compile(&[source]).ok()
    }

    fn is_target(&self, element: &Element) -> bool {
        if self.target_element.is_empty() {
            element.class == ElementClass::Paragraph
        } else {
            self.target_element.contains(&element.class)
        }
    }

    fn in_position_range(&self, index: usize) -> bool {
        match self.position_range.as_slice() {
            [start, end] => (*start..*end).contains(&(index as i64)),
            _ => true,
        }
    }
}

fn parse_classes(names: &[String]) -> Vec<ElementClass> {
    names
        .iter()
        .filter_map(|name| match name.as_str() {
            "PARAGRAPH" => Some(ElementClass::Paragraph),
            "TABLE" => Some(ElementClass::Table),
            "SYLLABUS" => Some(ElementClass::Syllabus),
            "PAGE_HEADER" => Some(ElementClass::PageHeader),
            "PAGE_FOOTER" => Some(ElementClass::PageFooter),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    fn build(json: &str) -> PartialText {
        let params: Map<String, Value> = serde_json::from_str(json).unwrap();
        let reader = ParamReader::new(&params);
        PartialText::from_params(&reader, &FieldDefaults::default(), None).unwrap()
    }

    fn ctx() -> FieldContext<'static> {
        FieldContext {
            name: "担保金额",
            path_key: "担保金额",
        }
    }

    fn index() -> ElementIndex {
        ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "担保情况概述"),
            Element::paragraph(1, 0, "担保金额：1,000万元。"),
            Element::paragraph(2, 0, "不构成关联担保，担保金额：2,000万元。"),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_match_document_order() {
        let resolver = build(r#"{"regs": ["担保金额[:：](?P<dst>[\\d,]+万元)"]}"#);
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value.as_deref(), Some("1,000万元"));
    }

    #[test]
    fn test_multi_collects_all_in_order() {
        let resolver = build(r#"{"regs": ["担保金额[:：](?P<dst>[\\d,]+万元)"], "multi": true}"#);
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        let elements: Vec<_> = candidates.iter().map(|c| c.element.unwrap()).collect();
        assert_eq!(elements, vec![1, 2]);
    }

    #[test]
    fn test_neglect_sentence() {
        let resolver = build(
            r#"{"regs": ["担保金额[:：](?P<dst>[\\d,]+万元)"], "multi": true,
                "neglect_patterns": ["关联担保"]}"#,
        );
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].element, Some(1));
    }

    #[test]
    fn test_default_answer_pattern_from_field_name() {
        let resolver = build(r#"{}"#);
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates[0].value.as_deref(), Some("1,000万元"));
    }

    #[test]
    fn test_use_answer_pattern_off_yields_nothing() {
        let resolver = build(r#"{"use_answer_pattern": false}"#);
        assert!(resolver.resolve(ctx(), &index(), &ElementFilter::default()).is_empty());
    }

    #[test]
    fn test_model_alternative_regex_sweep() {
        // The first regex matches nowhere; the second sweeps and hits.
        let resolver = build(
            r#"{"regs": ["没有这个[:：](?P<dst>\\S+)", "担保金额[:：](?P<dst>[\\d,]+万元)"],
                "model_alternative": true}"#,
        );
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates[0].value.as_deref(), Some("1,000万元"));
        assert_eq!(candidates[0].priority, 1);
    }
}

//! Extraction at fixed document positions.
//!
//! Attributes that live at the top of every filing (stock code, short name,
//! announcement number) sit in the first few elements; this resolver reads
//! exactly those positions instead of scanning.

use crate::element::index::ElementIndex;
use crate::element::Element;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

#[derive(Debug)]
pub struct FixedPosition {
    /// Element positions to evaluate; negatives count from the end.
    positions: Vec<i64>,
    /// Page set restriction; empty = all pages.
    pages: Vec<i64>,
    /// Ordered extraction regexes; the first with a `dst` hit wins.
    regs: PatternSet,
    /// When set, the element must also match one of these anchors.
    anchor_regs: PatternSet,
    /// Restrict evaluation to crude-tagged elements.
    use_crude_answer: bool,
    /// Minimum crude score for `use_crude_answer`.
    location_threshold: f32,
    multi_elements: bool,
}

impl FixedPosition {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            positions: reader.i64_list("positions"),
            pages: reader.i64_list("pages"),
            regs: reader.patterns("regs")?,
            anchor_regs: reader.patterns("anchor_regs")?,
            use_crude_answer: reader.bool("use_crude_answer", false),
            location_threshold: reader.f32("location_threshold", 0.0),
            multi_elements: reader.bool("multi_elements", defaults.multi_elements),
        })
    }

    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for element in self.collect(ctx, index) {
            if !self.anchor_regs.is_empty() && !self.anchor_regs.is_match(&clean_text(&element.text)) {
                continue;
            }
            if let Some(found) = self.regs.first_match(&clean_text(&element.text)) {
                candidates.push(
                    Candidate::from_text(found.text, element.index)
                        .with_span(found.span)
                        .with_priority(found.priority),
                );
                if !self.multi_elements {
                    break;
                }
            }
        }
        candidates
    }

    /// The elements to evaluate, document order.
    fn collect<'a>(&self, ctx: FieldContext<'_>, index: &'a ElementIndex) -> Vec<&'a Element> {
        if self.use_crude_answer {
            return index.crude_candidates(ctx.path_key, self.location_threshold, 10);
        }
        let pages: Vec<u32> = self.pages.iter().filter_map(|&p| index.resolve_page(p)).collect();
        let mut elements: Vec<&Element> = if self.positions.is_empty() {
            pages
                .iter()
                .flat_map(|&page| index.page_elements(page))
                .filter_map(|&i| index.get(i))
                .collect()
        } else {
            self.positions
                .iter()
                .filter_map(|&p| index.resolve_position(p))
                .filter_map(|i| index.get(i))
                .filter(|e| pages.is_empty() || pages.contains(&e.page))
                .collect()
        };
        elements.sort_by_key(|e| e.index);
        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    fn build(json: &str) -> FixedPosition {
        let params: Map<String, Value> = serde_json::from_str(json).unwrap();
        let reader = ParamReader::new(&params);
        FixedPosition::from_params(&reader, &FieldDefaults::default()).unwrap()
    }

    fn ctx() -> FieldContext<'static> {
        FieldContext {
            name: "公司代码",
            path_key: "公司代码",
        }
    }

    #[test]
    fn test_extracts_at_position() {
        let index = ElementIndex::from_elements(vec![Element::paragraph(
            0,
            0,
            "公司代码:600001 简称:ABC",
        )])
        .unwrap();
        let resolver = build(r#"{"positions": [0, 1, 2], "regs": ["代码[:：](?P<dst>\\d{6})"]}"#);
        let candidates = resolver.resolve(ctx(), &index);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value.as_deref(), Some("600001"));
        assert_eq!(candidates[0].element, Some(0));
    }

    #[test]
    fn test_anchor_must_match_same_element() {
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "代码:600001"),
            Element::paragraph(1, 0, "证券公告 代码:600002"),
        ])
        .unwrap();
        let resolver = build(
            r#"{"positions": [0, 1], "regs": ["代码[:：](?P<dst>\\d{6})"], "anchor_regs": ["证券公告"]}"#,
        );
        let candidates = resolver.resolve(ctx(), &index);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value.as_deref(), Some("600002"));
    }

    #[test]
    fn test_page_restriction() {
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "代码:600001"),
            Element::paragraph(1, 1, "代码:600002"),
        ])
        .unwrap();
        let resolver = build(r#"{"positions": [0, 1], "pages": [1], "regs": ["代码[:：](?P<dst>\\d{6})"]}"#);
        let candidates = resolver.resolve(ctx(), &index);
        assert_eq!(candidates[0].value.as_deref(), Some("600002"));
    }

    #[test]
    fn test_crude_answer_restriction() {
        use crate::element::index::CrudeTag;
        use std::collections::BTreeMap;

        let mut crude = BTreeMap::new();
        crude.insert(
            "公司代码".to_string(),
            vec![CrudeTag { element: 1, score: 0.8 }],
        );
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "代码:600001"),
            Element::paragraph(1, 0, "代码:600002"),
        ])
        .unwrap()
        .with_crude_answers(crude);
        let resolver = build(r#"{"use_crude_answer": true, "regs": ["代码[:：](?P<dst>\\d{6})"]}"#);
        let candidates = resolver.resolve(ctx(), &index);
        assert_eq!(candidates[0].value.as_deref(), Some("600002"));
    }
}

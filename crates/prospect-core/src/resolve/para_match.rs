//! Whole-paragraph matching.
//!
//! The matched paragraph itself is the answer's element; an optional
//! content pattern narrows the value to a substring.

use crate::element::index::ElementIndex;
use crate::element::ElementClass;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, ElementFilter, FieldContext, FieldDefaults};
use crate::schema::params::ParamReader;

#[derive(Debug)]
pub struct ParaMatch {
    paragraph_pattern: PatternSet,
    /// Narrows the value inside the matched paragraph.
    content_pattern: PatternSet,
    /// Join runs of adjacent matching paragraphs into one candidate.
    combine_paragraphs: bool,
    multi: bool,
}

impl ParaMatch {
    pub fn from_params(
        reader: &ParamReader<'_>,
        defaults: &FieldDefaults,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            paragraph_pattern: reader.patterns("paragraph_pattern")?,
            content_pattern: reader.patterns("content_pattern")?,
            combine_paragraphs: reader.bool("combine_paragraphs", false),
            multi: reader.bool("multi", defaults.multi),
        })
    }

    pub fn resolve(
        &self,
        _ctx: FieldContext<'_>,
        index: &ElementIndex,
        filter: &ElementFilter,
    ) -> Vec<Candidate> {
        let mut matched: Vec<usize> = index
            .iter()
            .filter(|e| e.class == ElementClass::Paragraph)
            .filter(|e| filter.keep(e, index))
            .filter(|e| self.paragraph_pattern.is_match(&clean_text(&e.text)))
            .map(|e| e.index)
            .collect();

        if !self.multi && !self.combine_paragraphs {
            matched.truncate(1);
        }

        let mut candidates = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        for element_index in matched {
            if self.combine_paragraphs {
                if let Some(&last) = run.last() {
                    if element_index == last + 1 {
                        run.push(element_index);
                        continue;
                    }
                    candidates.extend(self.emit(&run, index));
                }
                run = vec![element_index];
            } else {
                candidates.extend(self.emit(&[element_index], index));
            }
        }
        if !run.is_empty() {
            candidates.extend(self.emit(&run, index));
        }
        if !self.multi {
            candidates.truncate(1);
        }
        candidates
    }

    /// Build the candidate for one paragraph (or one combined run).
    fn emit(&self, run: &[usize], index: &ElementIndex) -> Option<Candidate> {
        let first = *run.first()?;
        let text = run
            .iter()
            .filter_map(|&i| index.get(i))
            .map(|e| clean_text(&e.text))
            .collect::<Vec<_>>()
            .join("");
        if self.content_pattern.is_empty() {
            return Some(Candidate::from_text(text, first));
        }
        self.content_pattern
            .first_match(&text)
            .map(|found| {
                Candidate::from_text(found.text, first)
                    .with_span(found.span)
                    .with_priority(found.priority)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    fn build(json: &str) -> ParaMatch {
        let params: Map<String, Value> = serde_json::from_str(json).unwrap();
        let reader = ParamReader::new(&params);
        ParaMatch::from_params(&reader, &FieldDefaults::default()).unwrap()
    }

    fn ctx() -> FieldContext<'static> {
        FieldContext {
            name: "决议内容",
            path_key: "决议内容",
        }
    }

    fn index() -> ElementIndex {
        ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "公司召开董事会"),
            Element::paragraph(1, 0, "审议通过《对外担保议案》"),
            Element::paragraph(2, 0, "表决结果:同意9票"),
            Element::paragraph(3, 0, "其他事项"),
        ])
        .unwrap()
    }

    #[test]
    fn test_matched_paragraph_is_candidate() {
        let resolver = build(r#"{"paragraph_pattern": ["审议通过"]}"#);
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].element, Some(1));
        assert_eq!(candidates[0].value.as_deref(), Some("审议通过《对外担保议案》"));
    }

    #[test]
    fn test_content_pattern_extracts_substring() {
        let resolver = build(
            r#"{"paragraph_pattern": ["表决结果"], "content_pattern": ["同意(?P<dst>\\d+)票"]}"#,
        );
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates[0].value.as_deref(), Some("9"));
    }

    #[test]
    fn test_combine_adjacent_paragraphs() {
        let resolver = build(r#"{"paragraph_pattern": ["议案|表决结果"], "combine_paragraphs": true}"#);
        let candidates = resolver.resolve(ctx(), &index(), &ElementFilter::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].value.as_deref(),
            Some("审议通过《对外担保议案》表决结果:同意9票")
        );
        assert_eq!(candidates[0].element, Some(1));
    }
}

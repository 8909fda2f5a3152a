//! Entity extraction from prose-embedded facts.
//!
//! Two stages: locate an anchor paragraph by a relation pattern, then run
//! each named entity's regex list over the anchor's neighborhood. Used for
//! tabular facts written out in prose, like voting counts.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::{Element, ElementClass};
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, FieldContext};
use crate::schema::params::ParamReader;

/// Elements scanned after the anchor before giving up.
const NEIGHBORHOOD: usize = 10;

#[derive(Debug)]
struct EntityOption {
    name: String,
    regs: PatternSet,
}

#[derive(Debug)]
pub struct RelationEntity {
    /// Locates the anchor paragraph.
    relation_pattern: PatternSet,
    /// The anchor must sit under a heading matching this.
    syllabus_pattern: PatternSet,
    /// The neighborhood ends at the first element matching this.
    stop_patterns: PatternSet,
    entities: Vec<EntityOption>,
}

impl RelationEntity {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        let mut entities = Vec::new();
        if let Some(raw) = reader.raw("entities") {
            for item in raw.as_array().cloned().unwrap_or_default() {
                let name = item
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let regs: Vec<String> = item
                    .get("regs")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                entities.push(EntityOption {
                    name,
                    regs: PatternSet::compile(&regs)?,
                });
            }
        }
        Ok(Self {
            relation_pattern: reader.patterns("relation_pattern")?,
            syllabus_pattern: reader.patterns("syllabus_pattern")?,
            stop_patterns: reader.patterns("stop_patterns")?,
            entities,
        })
    }

    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let Some(anchor) = self.find_anchor(index) else {
            debug!(field = ctx.name, "relation anchor not found");
            return Vec::new();
        };
        let neighborhood = self.neighborhood(anchor, index);

        let mut candidates = Vec::new();
        for entity in &self.entities {
            'paragraphs: for element in &neighborhood {
                if let Some(found) = entity.regs.first_match(&clean_text(&element.text)) {
                    let mut candidate = Candidate::from_text(found.text, element.index)
                        .with_span(found.span)
                        .with_priority(found.priority);
                    candidate.entity = Some(entity.name.clone());
                    candidates.push(candidate);
                    break 'paragraphs;
                }
            }
        }
        candidates
    }

    fn find_anchor<'a>(&self, index: &'a ElementIndex) -> Option<&'a Element> {
        index
            .iter()
            .filter(|e| e.class == ElementClass::Paragraph)
            .filter(|e| self.in_syllabus_scope(e, index))
            .find(|e| self.relation_pattern.is_match(&clean_text(&e.text)))
    }

    fn in_syllabus_scope(&self, element: &Element, index: &ElementIndex) -> bool {
        if self.syllabus_pattern.is_empty() {
            return true;
        }
        let tree = index.syllabus();
        let Some(node) = tree.node_for_element(element.index) else {
            return false;
        };
        if self.syllabus_pattern.is_match(&clean_text(&node.title)) {
            return true;
        }
        tree.ancestors(node)
            .iter()
            .any(|n| self.syllabus_pattern.is_match(&clean_text(&n.title)))
    }

    /// The anchor paragraph plus following paragraphs up to a stop pattern.
    fn neighborhood<'a>(&self, anchor: &'a Element, index: &'a ElementIndex) -> Vec<&'a Element> {
        let mut out = vec![anchor];
        for offset in 1..=NEIGHBORHOOD {
            let Some(element) = index.get(anchor.index + offset) else {
                break;
            };
            if element.class != ElementClass::Paragraph {
                continue;
            }
            if !self.stop_patterns.is_empty() && self.stop_patterns.is_match(&clean_text(&element.text)) {
                break;
            }
            out.push(element);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    fn build(json: &str) -> RelationEntity {
        let params: Map<String, Value> = serde_json::from_str(json).unwrap();
        let reader = ParamReader::new(&params);
        RelationEntity::from_params(&reader).unwrap()
    }

    fn ctx() -> FieldContext<'static> {
        FieldContext {
            name: "表决情况",
            path_key: "表决情况",
        }
    }

    fn index() -> ElementIndex {
        ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "董事会表决情况如下:"),
            Element::paragraph(1, 0, "同意9票,反对0票,弃权1票。"),
            Element::paragraph(2, 0, "本议案尚需提交股东大会。"),
            Element::paragraph(3, 0, "同意99票"),
        ])
        .unwrap()
    }

    #[test]
    fn test_entities_from_anchor_neighborhood() {
        let resolver = build(
            r#"{"relation_pattern": ["表决情况"],
                "stop_patterns": ["股东大会"],
                "entities": [{"name": "同意", "regs": ["同意(?P<dst>\\d+)票"]},
                             {"name": "反对", "regs": ["反对(?P<dst>\\d+)票"]},
                             {"name": "弃权", "regs": ["弃权(?P<dst>\\d+)票"]}]}"#,
        );
        let candidates = resolver.resolve(ctx(), &index());
        assert_eq!(candidates.len(), 3);
        let pairs: Vec<_> = candidates
            .iter()
            .map(|c| (c.entity.clone().unwrap(), c.value.clone().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("同意".to_string(), "9".to_string()),
                ("反对".to_string(), "0".to_string()),
                ("弃权".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_stop_pattern_bounds_neighborhood() {
        // 同意99票 sits past the stop pattern and must not win.
        let resolver = build(
            r#"{"relation_pattern": ["表决情况"],
                "stop_patterns": ["股东大会"],
                "entities": [{"name": "同意", "regs": ["同意(?P<dst>\\d+)票"]}]}"#,
        );
        let candidates = resolver.resolve(ctx(), &index());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].value.as_deref(), Some("9"));
    }

    #[test]
    fn test_missing_anchor_is_a_miss() {
        let resolver = build(r#"{"relation_pattern": ["监事会表决"]}"#);
        assert!(resolver.resolve(ctx(), &index()).is_empty());
    }
}

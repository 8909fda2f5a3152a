//! Score-threshold filtering with a composite predicate chain.
//!
//! Accepts upstream-scored elements above a threshold, then pushes them
//! through an ordered chain of predicates. Each step filters the record's
//! candidates and reports pass/fail; the first failure short-circuits and
//! its `predict_result` becomes the (enum) answer with the non-qualifying
//! elements dropped.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::{Element, ElementClass};
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, FieldContext};
use crate::schema::params::ParamReader;

/// One step of the composite chain.
#[derive(Debug)]
struct Predicate {
    regs: PatternSet,
    /// Answer reported when this step fails.
    predict_result: Option<String>,
}

#[derive(Debug)]
pub struct ScoreFilter {
    /// Minimum element score.
    threshold: f32,
    /// Element classes considered; empty = paragraphs and tables.
    aim_types: Vec<ElementClass>,
    predicates: Vec<Predicate>,
}

impl ScoreFilter {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        let mut predicates = Vec::new();
        if let Some(raw) = reader.raw("predicates") {
            let items = raw.as_array().cloned().unwrap_or_default();
            for item in items {
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
                predicates.push(Predicate {
                    regs: PatternSet::compile(&regs)?,
                    predict_result: item
                        .get("predict_result")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                });
            }
        }
        Ok(Self {
            threshold: reader.f32("threshold", 0.5),
            aim_types: parse_aim_types(&reader.str_list("aim_types")),
            predicates,
        })
    }

    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let mut record: Vec<&Element> = index
            .iter()
            .filter(|e| self.is_aim_type(e.class))
            .filter(|e| e.score.unwrap_or(0.0) >= self.threshold)
            .collect();
        debug!(field = ctx.name, passing = record.len(), "score threshold applied");

        for (step, predicate) in self.predicates.iter().enumerate() {
            let kept: Vec<&Element> = record
                .iter()
                .copied()
                .filter(|e| predicate.regs.is_empty() || predicate.regs.is_match(&clean_text(&e.text)))
                .collect();
            if kept.is_empty() {
                debug!(field = ctx.name, step, "composite predicate failed, short-circuit");
                return predicate
                    .predict_result
                    .as_deref()
                    .map(|value| vec![Candidate::constant(value)])
                    .unwrap_or_default();
            }
            record = kept;
        }

        record.into_iter().map(Candidate::from_element).collect()
    }

    fn is_aim_type(&self, class: ElementClass) -> bool {
        if self.aim_types.is_empty() {
            matches!(class, ElementClass::Paragraph | ElementClass::Table)
        } else {
            self.aim_types.contains(&class)
        }
    }
}

fn parse_aim_types(names: &[String]) -> Vec<ElementClass> {
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

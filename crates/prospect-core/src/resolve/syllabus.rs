//! Syllabus-scoped extraction.
//!
//! Locates a heading by feature regexes and returns the elements under it:
//! either the entire subtree or only the elements directly below the
//! heading. Registered as both `syllabus_elt_v2` and `syllabus_based`.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::syllabus::SyllabusNode;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, FieldContext};
use crate::schema::params::ParamReader;

/// What to collect under a located heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractFrom {
    /// The entire subtree, in document order.
    SameTypeElements,
    /// Only elements before the first nested heading.
    DirectChildren,
}

#[derive(Debug)]
pub struct SyllabusScoped {
    /// Feature regexes locating the heading.
    inject_features: PatternSet,
    /// Disable the field-name fallback for heading location.
    only_inject_features: bool,
    extract_from: ExtractFrom,
    /// Headings whose title matches are never selected.
    feature_black_list: PatternSet,
    /// Elements matching are dropped from the collected range.
    neglect_patterns: PatternSet,
    /// Collection stops at the first element matching this.
    break_para_pattern: PatternSet,
    /// Treat nested headings as out of scope.
    ignore_syllabus_children: bool,
    /// Cap on the number of collected elements.
    max_syllabus_range: Option<usize>,
}

impl SyllabusScoped {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        let extract_from = match reader.string("extract_from").as_deref() {
            Some("direct_children") => ExtractFrom::DirectChildren,
            _ => ExtractFrom::SameTypeElements,
        };
        Ok(Self {
            inject_features: reader.patterns("inject_syllabus_features")?,
            only_inject_features: reader.bool("only_inject_features", false),
            extract_from,
            feature_black_list: reader.patterns("feature_black_list")?,
            neglect_patterns: reader.patterns("neglect_patterns")?,
            break_para_pattern: reader.patterns("break_para_pattern")?,
            ignore_syllabus_children: reader.bool("ignore_syllabus_children", false),
            max_syllabus_range: reader.usize_opt("max_syllabus_range"),
        })
    }

    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let tree = index.syllabus();
        let mut nodes: Vec<&SyllabusNode> = tree.find_by_title(&self.inject_features);

        if !self.only_inject_features {
            let name = clean_text(ctx.name);
            for node in tree.nodes() {
                if !name.is_empty()
                    && clean_text(&node.title).contains(name.as_str())
                    && !nodes.iter().any(|n| n.element == node.element)
                {
                    nodes.push(node);
                }
            }
            nodes.sort_by_key(|n| n.element);
        }

        nodes.retain(|n| {
            self.feature_black_list.is_empty() || !self.feature_black_list.is_match(&clean_text(&n.title))
        });
        debug!(field = ctx.name, headings = nodes.len(), "syllabus headings located");

        let mut candidates = Vec::new();
        for node in nodes {
            let member_indexes = if self.extract_from == ExtractFrom::DirectChildren
                || self.ignore_syllabus_children
            {
                tree.direct_child_elements(node, index.elements())
            } else {
                tree.subtree_elements(node, self.max_syllabus_range)
            };

            'members: for member in member_indexes {
                let Some(element) = index.get(member) else {
                    continue;
                };
                let text = clean_text(&element.text);
                if !self.break_para_pattern.is_empty() && self.break_para_pattern.is_match(&text) {
                    break 'members;
                }
                if !self.neglect_patterns.is_empty() && self.neglect_patterns.is_match(&text) {
                    continue;
                }
                candidates.push(Candidate::from_element(element));
                if let Some(cap) = self.max_syllabus_range {
                    if candidates.len() >= cap {
                        return candidates;
                    }
                }
            }
        }
        candidates
    }
}

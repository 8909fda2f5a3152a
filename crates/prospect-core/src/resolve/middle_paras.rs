//! Paragraphs between two anchors.
//!
//! Thin resolver over the element-index anchor window: pick the candidate
//! domain (paragraphs, optionally tables read as paragraphs), run the
//! window query, and emit one candidate per element in the window.
//! Registered as `middle_paras` and `investment_restrictions_middle`.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::window::AnchorWindow;
use crate::element::{Element, ElementClass};
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::resolve::{Candidate, FieldContext};
use crate::schema::params::ParamReader;

#[derive(Debug)]
pub struct MiddleParas {
    window: AnchorWindow,
    /// Include tables in the candidate domain.
    table_regarded_as_paras: bool,
    /// Center the domain around the best crude-tagged element.
    use_top_crude_neighbor: bool,
    /// Cap on the window size (and the crude neighborhood radius).
    possible_element_counts: Option<usize>,
    neglect_patterns: PatternSet,
}

impl MiddleParas {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        let window = AnchorWindow {
            top_anchors: reader.patterns("top_anchor_regs")?,
            bottom_anchors: reader.patterns("bottom_anchor_regs")?,
            include_top_anchor: reader.bool("include_top_anchor", true),
            include_bottom_anchor: reader.bool("include_bottom_anchor", false),
            top_greed: reader.bool("top_greed", true),
            bottom_greed: reader.bool("bottom_greed", false),
            top_default: reader.bool("top_default", false),
            bottom_default: reader.bool("bottom_default", false),
            top_content_regs: reader.patterns("top_anchor_content_regs")?,
            skip_merged_para: reader.bool("skip_merged_para", false),
        };
        Ok(Self {
            window,
            table_regarded_as_paras: reader.bool("table_regarded_as_paras", false),
            use_top_crude_neighbor: reader.bool("use_top_crude_neighbor", false),
            possible_element_counts: reader.usize_opt("possible_element_counts"),
            neglect_patterns: reader.patterns("neglect_patterns")?,
        })
    }

    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let domain = self.domain(ctx, index);
        let mut slices = self.window.select(&domain);
        if let Some(cap) = self.possible_element_counts {
            slices.truncate(cap);
        }
        debug!(field = ctx.name, window = slices.len(), "anchor window selected");

        slices
            .into_iter()
            .filter(|slice| {
                self.neglect_patterns.is_empty()
                    || !self.neglect_patterns.is_match(&clean_text(&slice.text))
            })
            .map(|slice| {
                let mut candidate = Candidate::from_element(slice.element);
                candidate.value = Some(slice.text);
                candidate
            })
            .collect()
    }

    /// Ordered candidate elements the window query runs over.
    fn domain<'a>(&self, ctx: FieldContext<'_>, index: &'a ElementIndex) -> Vec<&'a Element> {
        let in_domain = |element: &Element| {
            element.class == ElementClass::Paragraph
                || (self.table_regarded_as_paras && element.class == ElementClass::Table)
        };

        if self.use_top_crude_neighbor {
            let crude = index.crude_candidates(ctx.path_key, 0.0, 1);
            if let Some(best) = crude.first() {
                let radius = self.possible_element_counts.unwrap_or(40);
                let start = best.index.saturating_sub(radius / 2);
                let end = (best.index + radius).min(index.len());
                return (start..end)
                    .filter_map(|i| index.get(i))
                    .filter(|e| in_domain(e))
                    .collect();
            }
        }
        index.iter().filter(|e| in_domain(e)).collect()
    }
}

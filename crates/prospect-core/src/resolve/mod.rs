//! Candidate resolvers: the strategy family behind every field.
//!
//! Each resolver name in a config's `models` list maps to one variant of
//! [`ResolverSpec`]. The contract is uniform: `resolve(field, index)` returns
//! ranked [`Candidate`]s, and the fallback chain decides acceptance.

pub mod enum_value;
pub mod fixed_position;
pub mod middle_paras;
pub mod para_match;
pub mod partial_text;
pub mod relation_entity;
pub mod score_filter;
pub mod syllabus;
pub mod table_kv;
pub mod table_row;
pub mod table_tuple;

use serde_json::{Map, Value};
use tracing::debug;

use crate::element::index::ElementIndex;
use crate::element::Element;
use crate::error::ConfigError;
use crate::normalize::text::clean_text;
use crate::pattern::PatternSet;
use crate::schema::params::ParamReader;

/// A tentative field value with provenance and score.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Extracted raw text; `None` for pure element candidates.
    pub value: Option<String>,
    /// Index of the justifying element, when any.
    pub element: Option<usize>,
    /// Byte span of the value inside the element's matching text.
    pub span: Option<(usize, usize)>,
    /// Relevance score; regex hits default to 1.0.
    pub score: f32,
    /// Regex priority that produced the value (earlier regex wins ties).
    pub priority: usize,
    /// Entity label attached by `relation_entity`.
    pub entity: Option<String>,
    /// Row number for table-derived candidates.
    pub row: Option<u32>,
}

impl Candidate {
    pub fn from_text(value: impl Into<String>, element: usize) -> Self {
        Self {
            value: Some(value.into()),
            element: Some(element),
            span: None,
            score: 1.0,
            priority: 0,
            entity: None,
            row: None,
        }
    }

    pub fn from_element(element: &Element) -> Self {
        Self {
            value: Some(element.text.clone()),
            element: Some(element.index),
            span: None,
            score: element.score.unwrap_or(1.0),
            priority: 0,
            entity: None,
            row: None,
        }
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            element: None,
            span: None,
            score: 1.0,
            priority: 0,
            entity: None,
            row: None,
        }
    }

    pub fn with_span(mut self, span: (usize, usize)) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_row(mut self, row: u32) -> Self {
        self.row = Some(row);
        self
    }
}

/// Tie-break order for single-valued fields: score descending, then
/// document order ascending (element-less candidates last), then regex
/// priority.
pub fn candidate_order(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| match (a.element, b.element) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        })
        .then(a.priority.cmp(&b.priority))
}

/// Rank candidates in place. The sort is stable, so equal candidates keep
/// emission order.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(candidate_order);
}

/// Field-level defaults a model entry may override.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldDefaults {
    pub multi: bool,
    pub multi_elements: bool,
}

/// Per-field context handed to resolvers at evaluation time.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    /// Field name (last path segment); feeds name-derived patterns and
    /// table header resolution.
    pub name: &'a str,
    /// Full path key, used for crude-answer lookups.
    pub path_key: &'a str,
}

/// Element pre-filters shared by all resolvers.
#[derive(Debug, Default)]
pub struct ElementFilter {
    text_regs: PatternSet,
    neglect_text_regs: PatternSet,
    /// Pages to keep; negatives count from the document end.
    page_range: Vec<i64>,
}

impl ElementFilter {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            text_regs: reader.patterns("text_regs")?,
            neglect_text_regs: reader.patterns("neglect_text_regs")?,
            page_range: reader.i64_list("page_range"),
        })
    }

    pub fn keep(&self, element: &Element, index: &ElementIndex) -> bool {
        let text = clean_text(&element.text);
        if !self.text_regs.is_empty() && !self.text_regs.is_match(&text) {
            return false;
        }
        if !self.neglect_text_regs.is_empty() && self.neglect_text_regs.is_match(&text) {
            return false;
        }
        if !self.page_range.is_empty() {
            let pages: Vec<u32> = self
                .page_range
                .iter()
                .filter_map(|&p| index.resolve_page(p))
                .collect();
            if !pages.contains(&element.page) {
                return false;
            }
        }
        true
    }
}

/// Parameters every resolver shares.
#[derive(Debug, Default)]
pub struct CommonParams {
    pub filter: ElementFilter,
    /// Strip one level of brackets wrapping the value.
    pub strip_brackets: bool,
    /// Minimum character count of an accepted value.
    pub need_match_length: usize,
}

impl CommonParams {
    fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: ElementFilter::from_params(reader)?,
            strip_brackets: reader.bool("strip_brackets", false),
            need_match_length: reader.usize("need_match_length", 0),
        })
    }
}

/// A configured resolver: the tagged variant selected by the model `name`.
#[derive(Debug)]
pub struct ResolverSpec {
    name: &'static str,
    common: CommonParams,
    kind: ResolverKind,
}

#[derive(Debug)]
enum ResolverKind {
    FixedPosition(fixed_position::FixedPosition),
    PartialText(partial_text::PartialText),
    Syllabus(syllabus::SyllabusScoped),
    MiddleParas(middle_paras::MiddleParas),
    TableRow(table_row::TableRow),
    TableColumnContent(table_row::TableColumnContent),
    TableKv(table_kv::TableKv),
    TableTuple(table_tuple::TableTuple),
    ParaMatch(para_match::ParaMatch),
    ScoreFilter(score_filter::ScoreFilter),
    RelationEntity(relation_entity::RelationEntity),
    EnumValue(enum_value::EnumValue),
}

impl ResolverSpec {
    /// Construct the resolver a model entry names. Unknown names are fatal;
    /// unknown parameters are warned about and ignored.
    pub fn build(
        name: &str,
        params: &Map<String, Value>,
        defaults: &FieldDefaults,
        field: &str,
    ) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(params);
        let common = CommonParams::from_params(&reader)?;
        let (kind, canonical) = match name {
            "fixed_position" => (
                ResolverKind::FixedPosition(fixed_position::FixedPosition::from_params(&reader, defaults)?),
                "fixed_position",
            ),
            "partial_text" => (
                ResolverKind::PartialText(partial_text::PartialText::from_params(&reader, defaults, None)?),
                "partial_text",
            ),
            "re_buy_date" | "extra_date_info" => (
                ResolverKind::PartialText(partial_text::PartialText::from_params(
                    &reader,
                    defaults,
                    Some(partial_text::DATE_ANSWER_REGS),
                )?),
                "partial_text",
            ),
            "syllabus_elt_v2" | "syllabus_based" => (
                ResolverKind::Syllabus(syllabus::SyllabusScoped::from_params(&reader)?),
                "syllabus_elt_v2",
            ),
            "middle_paras" | "investment_restrictions_middle" => (
                ResolverKind::MiddleParas(middle_paras::MiddleParas::from_params(&reader)?),
                "middle_paras",
            ),
            "table_row" => (
                ResolverKind::TableRow(table_row::TableRow::from_params(&reader, defaults)?),
                "table_row",
            ),
            "table_column_content" => (
                ResolverKind::TableColumnContent(table_row::TableColumnContent::from_params(&reader, defaults)?),
                "table_column_content",
            ),
            "table_kv" => (
                ResolverKind::TableKv(table_kv::TableKv::from_params(&reader, defaults, None)?),
                "table_kv",
            ),
            "trading_exchange_kv" => (
                ResolverKind::TableKv(table_kv::TableKv::from_params(
                    &reader,
                    defaults,
                    Some(table_kv::TRADING_EXCHANGE_KEYS),
                )?),
                "table_kv",
            ),
            "table_tuple" | "table_tuple_select" => (
                ResolverKind::TableTuple(table_tuple::TableTuple::from_params(&reader, defaults)?),
                "table_tuple",
            ),
            "para_match" => (
                ResolverKind::ParaMatch(para_match::ParaMatch::from_params(&reader, defaults)?),
                "para_match",
            ),
            "score_filter" => (
                ResolverKind::ScoreFilter(score_filter::ScoreFilter::from_params(&reader)?),
                "score_filter",
            ),
            "relation_entity" => (
                ResolverKind::RelationEntity(relation_entity::RelationEntity::from_params(&reader)?),
                "relation_entity",
            ),
            "enum_value" => (
                ResolverKind::EnumValue(enum_value::EnumValue::from_params(&reader)?),
                "enum_value",
            ),
            other => return Err(ConfigError::UnknownResolver(other.to_string())),
        };
        reader.finish(name, field);
        Ok(Self {
            name: canonical,
            common,
            kind,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strip_brackets(&self) -> bool {
        self.common.strip_brackets
    }

    /// Produce candidates for one field evaluation.
    pub fn resolve(&self, ctx: FieldContext<'_>, index: &ElementIndex) -> Vec<Candidate> {
        let raw = match &self.kind {
            ResolverKind::FixedPosition(r) => r.resolve(ctx, index),
            ResolverKind::PartialText(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::Syllabus(r) => r.resolve(ctx, index),
            ResolverKind::MiddleParas(r) => r.resolve(ctx, index),
            ResolverKind::TableRow(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::TableColumnContent(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::TableKv(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::TableTuple(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::ParaMatch(r) => r.resolve(ctx, index, &self.common.filter),
            ResolverKind::ScoreFilter(r) => r.resolve(ctx, index),
            ResolverKind::RelationEntity(r) => r.resolve(ctx, index),
            ResolverKind::EnumValue(r) => r.resolve(ctx, index),
        };
        let kept = self.apply_common(raw, index);
        debug!(resolver = self.name, field = ctx.name, candidates = kept.len(), "resolver done");
        kept
    }

    /// Shared post-pass: element filters and the match-length lower bound.
    fn apply_common(&self, candidates: Vec<Candidate>, index: &ElementIndex) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|candidate| {
                if let Some(element) = candidate.element.and_then(|i| index.get(i)) {
                    if !self.common.filter.keep(element, index) {
                        return false;
                    }
                }
                if self.common.need_match_length > 0 {
                    let length = candidate
                        .value
                        .as_deref()
                        .map(|v| clean_text(v).chars().count())
                        .unwrap_or(0);
                    if length < self.common.need_match_length {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

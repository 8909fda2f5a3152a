//! Fallback chain: sequential application of a field's model list.

use tracing::debug;

use crate::element::index::ElementIndex;
use crate::normalize::{self, NormalizedValue};
use crate::resolve::{candidate_order, Candidate, FieldContext};
use crate::schema::{FieldSpec, PickStrategy};

/// A candidate that survived normalization and enum mapping.
#[derive(Debug, Clone)]
pub struct ResolvedCandidate {
    pub candidate: Candidate,
    pub normalized: NormalizedValue,
    /// Post-mapped enum label, when the field defines an enum.
    pub enum_label: Option<String>,
    /// Unit attached by grouping-time propagation.
    pub unit: Option<String>,
}

impl ResolvedCandidate {
    /// The value the answer leaf reports: enum label over normalized text.
    pub fn final_value(&self) -> &str {
        self.enum_label.as_deref().unwrap_or(&self.normalized.text)
    }
}

/// Per-model invocation stats, kept for the field audit log.
#[derive(Debug, Clone)]
pub struct ModelStat {
    pub name: &'static str,
    pub candidates: usize,
}

/// Outcome of one field evaluation.
#[derive(Debug, Default)]
pub struct ResolvedField {
    pub candidates: Vec<ResolvedCandidate>,
    pub stats: Vec<ModelStat>,
    pub diagnostics: Vec<String>,
}

impl ResolvedField {
    pub fn is_null(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Evaluate one field: iterate its models in order, accept the first
/// non-empty surviving result (or aggregate them all under the `all`
/// strategy), then rank and deduplicate for single-valued fields.
pub fn run_chain(field: &FieldSpec, index: &ElementIndex) -> ResolvedField {
    let path_key = field.path_key();
    let ctx = FieldContext {
        name: field.name(),
        path_key: &path_key,
    };

    let mut outcome = ResolvedField::default();
    for model in &field.models {
        let raw = model.resolve(ctx, index);
        let survivors = admit(field, index, raw, model.strip_brackets());
        outcome.stats.push(ModelStat {
            name: model.name(),
            candidates: survivors.len(),
        });
        if survivors.is_empty() {
            continue;
        }
        outcome.candidates.extend(survivors);
        if field.pick_answer_strategy == PickStrategy::First {
            break;
        }
    }

    if outcome.candidates.is_empty() {
        // All models failed; an enum default still answers.
        if let Some(default) = field.enum_def.as_ref().and_then(|e| e.default.clone()) {
            debug!(field = field.name(), %default, "all models failed, enum default applies");
            outcome.candidates.push(ResolvedCandidate {
                candidate: Candidate::constant(default.as_str()),
                normalized: normalize::normalize(&default, false),
                enum_label: Some(default),
                unit: None,
            });
        }
        return outcome;
    }

    if field.multi {
        // Multi answers keep strict document order.
        outcome
            .candidates
            .sort_by_key(|c| c.candidate.element.unwrap_or(usize::MAX));
    } else {
        outcome
            .candidates
            .sort_by(|a, b| candidate_order(&a.candidate, &b.candidate));
        if let [first, second, ..] = outcome.candidates.as_slice() {
            if ties(&first.candidate, &second.candidate) {
                outcome.diagnostics.push(format!(
                    "ambiguous candidates for {}: picked element {:?} over {:?}",
                    field.name(),
                    first.candidate.element,
                    second.candidate.element
                ));
            }
        }
        outcome.candidates.truncate(1);
    }
    outcome
}

/// Exactly equal after every tie-break rule.
fn ties(a: &Candidate, b: &Candidate) -> bool {
    a.score == b.score && a.element == b.element && a.priority == b.priority
}

/// Normalization + enum mapping + the `need_syl` guard.
fn admit(
    field: &FieldSpec,
    index: &ElementIndex,
    candidates: Vec<Candidate>,
    strip_brackets: bool,
) -> Vec<ResolvedCandidate> {
    let mut survivors = Vec::new();
    for candidate in candidates {
        let Some(raw) = candidate.value.as_deref() else {
            continue;
        };
        if field.need_syl {
            let inside = candidate
                .element
                .and_then(|i| index.syllabus().node_for_element(i))
                .is_some();
            if !inside {
                continue;
            }
        }
        let normalized = normalize::normalize(raw, strip_brackets);
        if normalized.text.is_empty() {
            continue;
        }
        let enum_label = match &field.enum_def {
            Some(enum_def) => match enum_def.map_value(&normalized.text) {
                Some(label) => Some(label),
                // No label and no default: enum mapping failed.
                None => continue,
            },
            None => None,
        };
        survivors.push(ResolvedCandidate {
            candidate,
            normalized,
            enum_label,
            unit: None,
        });
    }
    survivors
}

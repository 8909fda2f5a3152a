//! Stable in-memory representation of extracted answers.
//!
//! The tree mirrors the schema paths: interior nodes are keyed maps (key
//! order follows the config, not lexicographic order), list-valued fields
//! become row lists, and leaves carry the value together with every element
//! reference that contributed, for downstream highlighting.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::chain::{ModelStat, ResolvedCandidate, ResolvedField};

/// Provenance of one leaf value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceRef {
    pub element: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
}

/// One accepted value of a leaf.
#[derive(Debug, Clone, Serialize)]
pub struct LeafValue {
    /// Final value: the enum label when mapped, else the normalized text.
    pub value: String,
    /// The raw matched text before normalization.
    pub raw: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl LeafValue {
    pub fn from_resolved(resolved: &ResolvedCandidate) -> Self {
        Self {
            value: resolved.final_value().to_string(),
            raw: resolved.normalized.raw.clone(),
            sources: resolved
                .candidate
                .element
                .map(|element| {
                    vec![SourceRef {
                        element,
                        span: resolved.candidate.span,
                    }]
                })
                .unwrap_or_default(),
            unit: resolved.unit.clone(),
            date: resolved.normalized.date.map(|d| d.to_string()),
            entity: resolved.candidate.entity.clone(),
        }
    }
}

/// A leaf of the answer tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeafAnswer {
    /// Convenience single value: the first entry of `values`, or null.
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<LeafValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl LeafAnswer {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn from_resolved(resolved: &ResolvedField) -> Self {
        let values: Vec<LeafValue> =
            resolved.candidates.iter().map(LeafValue::from_resolved).collect();
        Self {
            value: values.first().map(|v| v.value.clone()),
            values,
            diagnostics: resolved.diagnostics.clone(),
        }
    }

    pub fn from_candidates(candidates: &[ResolvedCandidate]) -> Self {
        let values: Vec<LeafValue> = candidates.iter().map(LeafValue::from_resolved).collect();
        Self {
            value: values.first().map(|v| v.value.clone()),
            values,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.values.is_empty()
    }

    /// Every element reference contributing to this leaf.
    pub fn elements(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for value in &self.values {
            for source in &value.sources {
                if !out.contains(&source.element) {
                    out.push(source.element);
                }
            }
        }
        out
    }
}

/// An interior node: path segment → child, config order preserved.
#[derive(Debug, Clone, Default)]
pub struct AnswerMap {
    entries: Vec<(String, AnswerNode)>,
}

impl AnswerMap {
    pub fn insert(&mut self, key: impl Into<String>, node: AnswerNode) {
        self.entries.push((key.into(), node));
    }

    pub fn get(&self, key: &str) -> Option<&AnswerNode> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, AnswerNode)> {
        self.entries.iter()
    }
}

impl Serialize for AnswerMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

/// A node of the answer tree.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnswerNode {
    Leaf(LeafAnswer),
    Map(AnswerMap),
    /// Rows of a list-valued field, document order.
    Rows(Vec<AnswerMap>),
}

impl AnswerNode {
    pub fn as_leaf(&self) -> Option<&LeafAnswer> {
        match self {
            AnswerNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AnswerMap> {
        match self {
            AnswerNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[AnswerMap]> {
        match self {
            AnswerNode::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Per-field audit entry: which models ran and what they said.
#[derive(Debug, Clone, Serialize)]
pub struct FieldAudit {
    pub path: String,
    pub models: Vec<AuditModel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditModel {
    pub name: &'static str,
    pub candidates: usize,
}

impl FieldAudit {
    pub fn from_resolved(path: String, resolved: &ResolvedField) -> Self {
        Self {
            path,
            models: resolved
                .stats
                .iter()
                .map(|ModelStat { name, candidates }| AuditModel {
                    name,
                    candidates: *candidates,
                })
                .collect(),
            diagnostics: resolved.diagnostics.clone(),
        }
    }

    pub fn model_candidates(&self, name: &str) -> Option<usize> {
        self.models.iter().find(|m| m.name == name).map(|m| m.candidates)
    }
}

/// The frozen result of one extraction.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerTree {
    pub root: AnswerMap,
    /// Per-field audit log, config order.
    pub audit: Vec<FieldAudit>,
}

impl AnswerTree {
    /// Walk the tree by path segments.
    pub fn node(&self, path: &[&str]) -> Option<&AnswerNode> {
        let mut current = self.root.get(path.first()?)?;
        for segment in &path[1..] {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// The leaf value at a path, if present and non-null.
    pub fn value(&self, path: &[&str]) -> Option<&str> {
        self.node(path)?.as_leaf()?.value.as_deref()
    }

    pub fn audit_for(&self, path_key: &str) -> Option<&FieldAudit> {
        self.audit.iter().find(|a| a.path == path_key)
    }
}

//! Config-tree traversal and answer assembly.
//!
//! `extract` is the engine's single entry point: a pure function over an
//! immutable [`ElementIndex`] and a loaded [`PredictorConfig`]. Repeated
//! runs yield identical answer trees.

use tracing::{debug, info};

use crate::answer::{AnswerMap, AnswerNode, AnswerTree, FieldAudit, LeafAnswer};
use crate::chain::run_chain;
use crate::element::index::ElementIndex;
use crate::group::{group_rows, ChildResolution};
use crate::schema::{FieldSpec, PredictorConfig};

/// Extract the schema-shaped answer tree from a document.
pub fn extract(config: &PredictorConfig, index: &ElementIndex) -> AnswerTree {
    info!(
        fields = config.fields.len(),
        elements = index.len(),
        "extraction started"
    );
    let mut audit = Vec::new();
    let root = walk_level(config, index, &[], &mut audit);
    info!(audited_fields = audit.len(), "extraction finished");
    AnswerTree { root, audit }
}

/// Evaluate every child under `prefix`, honoring `depends` order, and
/// assemble the keyed map in config order.
fn walk_level(
    config: &PredictorConfig,
    index: &ElementIndex,
    prefix: &[String],
    audit: &mut Vec<FieldAudit>,
) -> AnswerMap {
    let segments = child_segments(config, prefix);
    let ordered = dependency_order(config, prefix, &segments);

    let mut evaluated: Vec<(String, AnswerNode)> = Vec::new();
    for segment in &ordered {
        let mut path = prefix.to_vec();
        path.push(segment.clone());
        let node = walk_node(config, index, &path, audit);
        evaluated.push((segment.clone(), node));
    }

    let mut map = AnswerMap::default();
    for segment in &segments {
        if let Some(position) = evaluated.iter().position(|(name, _)| name == segment) {
            let (name, node) = evaluated.remove(position);
            map.insert(name, node);
        }
    }
    map
}

fn walk_node(
    config: &PredictorConfig,
    index: &ElementIndex,
    path: &[String],
    audit: &mut Vec<FieldAudit>,
) -> AnswerNode {
    let spec = config.field_at(path);
    let has_children = !child_segments(config, path).is_empty();

    match spec {
        Some(spec) if !spec.sub_primary_key.is_empty() && has_children => {
            AnswerNode::Rows(walk_grouped(config, index, spec, audit))
        }
        _ if has_children => AnswerNode::Map(walk_level(config, index, path, audit)),
        Some(spec) => {
            let resolved = run_chain(spec, index);
            audit.push(FieldAudit::from_resolved(spec.path_key(), &resolved));
            debug!(field = spec.name(), null = resolved.is_null(), "leaf evaluated");
            AnswerNode::Leaf(LeafAnswer::from_resolved(&resolved))
        }
        None => AnswerNode::Leaf(LeafAnswer::null()),
    }
}

/// Evaluate the children of a grouped parent and zip them into rows.
fn walk_grouped(
    config: &PredictorConfig,
    index: &ElementIndex,
    parent: &FieldSpec,
    audit: &mut Vec<FieldAudit>,
) -> Vec<AnswerMap> {
    let child_specs = config.children_of(&parent.path);
    let names: Vec<String> = child_specs.iter().map(|s| s.name().to_string()).collect();
    let ordered = dependency_order(config, &parent.path, &names);

    let mut resolutions: Vec<ChildResolution<'_>> = Vec::new();
    for name in &ordered {
        let Some(spec) = child_specs.iter().find(|s| s.name() == name.as_str()) else {
            continue;
        };
        let resolved = run_chain(spec, index);
        audit.push(FieldAudit::from_resolved(spec.path_key(), &resolved));
        resolutions.push(ChildResolution { spec, resolved });
    }
    // Rows list children in config order regardless of evaluation order.
    resolutions.sort_by_key(|r| names.iter().position(|n| n == r.spec.name()));
    group_rows(parent, &resolutions, index)
}

/// Distinct next path segments under a prefix, config order.
fn child_segments(config: &PredictorConfig, prefix: &[String]) -> Vec<String> {
    let mut segments = Vec::new();
    for field in &config.fields {
        if field.path.len() > prefix.len() && field.path[..prefix.len()] == *prefix {
            let segment = field.path[prefix.len()].clone();
            if !segments.contains(&segment) {
                segments.push(segment);
            }
        }
    }
    segments
}

/// Topological order over sibling `depends`, stable w.r.t. config order.
/// Cycles were rejected at load, so this always terminates.
fn dependency_order(config: &PredictorConfig, prefix: &[String], segments: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    let mut pending: Vec<&String> = segments.iter().collect();

    while !pending.is_empty() {
        let mut progressed = false;
        let mut next_pending = Vec::new();
        for &segment in &pending {
            let mut path = prefix.to_vec();
            path.push(segment.clone());
            let ready = match config.field_at(&path) {
                Some(spec) => spec.depends.iter().all(|dep| {
                    !segments.contains(dep) || ordered.iter().any(|done| done == dep)
                }),
                None => true,
            };
            if ready {
                ordered.push(segment.clone());
                progressed = true;
            } else {
                next_pending.push(segment);
            }
        }
        if !progressed {
            // Unreachable with a validated config; avoid spinning anyway.
            ordered.extend(next_pending.into_iter().cloned());
            break;
        }
        pending = next_pending;
    }
    ordered
}

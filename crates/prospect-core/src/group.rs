//! Row grouping under a sub-primary-key, plus unit propagation.
//!
//! Sibling fields evaluated independently come back as parallel candidate
//! lists; this module zips them into rows. Row anchors come from the key
//! fields' candidates in document order, non-key candidates attach to the
//! nearest anchor under the field's lookup strategy, and each candidate is
//! attached to at most one row.

use tracing::debug;

use crate::answer::{AnswerMap, AnswerNode, LeafAnswer};
use crate::chain::{ResolvedCandidate, ResolvedField};
use crate::element::index::ElementIndex;
use crate::normalize::unit::{find_declared_unit, find_unit};
use crate::resolve::Candidate;
use crate::schema::{FieldSpec, GroupPolicy, LookupStrategy};

/// One evaluated child of a grouped parent.
pub struct ChildResolution<'a> {
    pub spec: &'a FieldSpec,
    pub resolved: ResolvedField,
}

impl ChildResolution<'_> {
    fn name(&self) -> &str {
        self.spec.name()
    }
}

/// Align the children of a `sub_primary_key` parent into rows.
pub fn group_rows(
    parent: &FieldSpec,
    children: &[ChildResolution<'_>],
    index: &ElementIndex,
) -> Vec<AnswerMap> {
    let key_names = &parent.sub_primary_key;
    let Some(first_key) = children.iter().find(|c| Some(c.name()) == key_names.first().map(String::as_str))
    else {
        return Vec::new();
    };

    // Row anchors: the first key field's candidates, document order.
    let mut rows: Vec<Row> = first_key
        .resolved
        .candidates
        .iter()
        .enumerate()
        .map(|(ordinal, candidate)| Row {
            anchor: candidate.candidate.element,
            ordinal,
            fields: vec![(first_key.name().to_string(), vec![candidate.clone()])],
        })
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }

    // Additional key fields align by position.
    for key_name in key_names.iter().skip(1) {
        if let Some(child) = children.iter().find(|c| c.name() == key_name.as_str()) {
            for row in rows.iter_mut() {
                let aligned = child
                    .resolved
                    .candidates
                    .get(row.ordinal)
                    .map(|c| vec![c.clone()])
                    .unwrap_or_default();
                row.fields.push((key_name.clone(), aligned));
            }
        }
    }

    // Non-key fields attach by lookup strategy; share columns broadcast.
    for child in children {
        if key_names.iter().any(|k| k == child.name()) {
            continue;
        }
        if child.spec.share_column {
            for row in rows.iter_mut() {
                row.fields
                    .push((child.name().to_string(), child.resolved.candidates.clone()));
            }
            continue;
        }
        attach_by_lookup(&mut rows, child);
    }

    propagate_units(parent, &mut rows, index);

    if parent.strict_group {
        let mandatory: Vec<&str> = children
            .iter()
            .filter(|c| !c.spec.share_column && !key_names.iter().any(|k| k == c.name()))
            .map(|c| c.name())
            .collect();
        rows.retain(|row| {
            mandatory.iter().all(|name| {
                row.fields
                    .iter()
                    .any(|(field, candidates)| field == name && !candidates.is_empty())
            })
        });
    }

    debug!(parent = parent.name(), rows = rows.len(), "grouping done");
    rows.into_iter().map(|row| row.into_answer_map(children)).collect()
}

struct Row {
    anchor: Option<usize>,
    ordinal: usize,
    fields: Vec<(String, Vec<ResolvedCandidate>)>,
}

impl Row {
    /// Build the row map with every configured child present (null leaves
    /// for misses), children in config order.
    fn into_answer_map(self, children: &[ChildResolution<'_>]) -> AnswerMap {
        let mut map = AnswerMap::default();
        for child in children {
            let leaf = self
                .fields
                .iter()
                .find(|(name, _)| name == child.name())
                .map(|(_, candidates)| LeafAnswer::from_candidates(candidates))
                .unwrap_or_else(LeafAnswer::null);
            map.insert(child.name(), AnswerNode::Leaf(leaf));
        }
        map
    }
}

/// Attach one non-key child's candidates to rows; each candidate is used
/// at most once.
fn attach_by_lookup(rows: &mut [Row], child: &ChildResolution<'_>) {
    let policy = child.spec.group.clone().unwrap_or_else(GroupPolicy::default);
    let candidates = &child.resolved.candidates;
    let mut used = vec![false; candidates.len()];

    for row in rows.iter_mut() {
        let Some(anchor) = row.anchor else {
            row.fields.push((child.name().to_string(), Vec::new()));
            continue;
        };
        let mut best: Option<(usize, i64)> = None;
        for (pos, candidate) in candidates.iter().enumerate() {
            if used[pos] {
                continue;
            }
            let Some(element) = candidate.candidate.element else {
                continue;
            };
            let distance = element as i64 - anchor as i64;
            if !in_range(distance, policy.lookup_strategy, policy.range_num) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_distance)) => distance.abs() < best_distance.abs(),
            };
            if better {
                best = Some((pos, distance));
            }
        }
        match best {
            Some((pos, _)) => {
                used[pos] = true;
                row.fields
                    .push((child.name().to_string(), vec![candidates[pos].clone()]));
            }
            None => row.fields.push((child.name().to_string(), Vec::new())),
        }
    }
}

fn in_range(distance: i64, strategy: LookupStrategy, range: usize) -> bool {
    let range = range as i64;
    match strategy {
        LookupStrategy::Lookahead => (0..=range).contains(&distance),
        LookupStrategy::Lookbehind => (-range..=0).contains(&distance),
        LookupStrategy::Both => distance.abs() <= range,
    }
}

/// Resolve `unit_depend` links: a row's unit comes from the value's own
/// element, else the nearest preceding declared unit, else a document-level
/// declaration. Values are never rewritten.
fn propagate_units(parent: &FieldSpec, rows: &mut [Row], index: &ElementIndex) {
    for (value_field, unit_field) in &parent.unit_depend {
        for row in rows.iter_mut() {
            let Some(position) = row.fields.iter().position(|(name, _)| name == value_field) else {
                continue;
            };
            let elements: Vec<usize> = row.fields[position]
                .1
                .iter()
                .filter_map(|c| c.candidate.element)
                .collect();
            let Some(&element) = elements.first() else {
                continue;
            };
            let Some(unit) = resolve_unit(element, index) else {
                continue;
            };
            for candidate in &mut row.fields[position].1 {
                candidate.unit = Some(unit.clone());
            }
            // Fill the unit sibling when grouping produced nothing for it.
            match row.fields.iter().position(|(name, _)| name == unit_field) {
                Some(entry) => {
                    if row.fields[entry].1.is_empty() {
                        row.fields[entry].1.push(unit_candidate(&unit));
                    }
                }
                None => row.fields.push((unit_field.clone(), vec![unit_candidate(&unit)])),
            }
        }
    }
}

fn unit_candidate(unit: &str) -> ResolvedCandidate {
    ResolvedCandidate {
        candidate: Candidate::constant(unit),
        normalized: crate::normalize::normalize(unit, false),
        enum_label: None,
        unit: None,
    }
}

fn resolve_unit(element: usize, index: &ElementIndex) -> Option<String> {
    // (a) Row-local: the value element's own text.
    if let Some(found) = index.get(element).and_then(|e| find_unit(&e.text)) {
        return Some(found);
    }
    // (b) Nearest preceding header-level declaration.
    for previous in index.paragraphs_near(element, -1, 10) {
        if let Some(found) = find_declared_unit(&previous.text) {
            return Some(found);
        }
    }
    // (c) Document-level declaration.
    index.iter().find_map(|e| find_declared_unit(&e.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::run_chain;
    use crate::element::Element;
    use crate::schema::PredictorConfig;
    use pretty_assertions::assert_eq;

    fn guarantee_config() -> PredictorConfig {
        PredictorConfig::from_json(
            r#"[
            {"path": ["担保"], "sub_primary_key": ["被担保人名称"], "strict_group": false,
             "unit_depend": {"担保金额": "单位"}},
            {"path": ["担保", "被担保人名称"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
            {"path": ["担保", "担保金额"], "multi": true,
             "group": {"lookup_strategy": "lookahead", "range_num": 10},
             "models": [{"name": "partial_text", "regs": ["担保金额[:：](?P<dst>\\d+m?元)"]}]},
            {"path": ["担保", "单位"], "models": []}
        ]"#,
        )
        .unwrap()
    }

    fn guarantee_index() -> ElementIndex {
        ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "被担保人名称：甲"),
            Element::paragraph(1, 0, "担保金额：100元"),
            Element::paragraph(2, 0, "被担保人名称：乙"),
            Element::paragraph(3, 0, "担保金额：200元"),
            Element::paragraph(4, 0, "被担保人名称：丙"),
            Element::paragraph(5, 0, "担保金额：300元"),
        ])
        .unwrap()
    }

    fn resolve_children<'a>(
        config: &'a PredictorConfig,
        index: &ElementIndex,
    ) -> Vec<ChildResolution<'a>> {
        config
            .children_of(&["担保".to_string()])
            .into_iter()
            .map(|spec| ChildResolution {
                spec,
                resolved: run_chain(spec, index),
            })
            .collect()
    }

    #[test]
    fn test_lookahead_rows() {
        let config = guarantee_config();
        let index = guarantee_index();
        let parent = config.field_at(&["担保".to_string()]).unwrap();
        let rows = group_rows(parent, &resolve_children(&config, &index), &index);
        assert_eq!(rows.len(), 3);

        let names: Vec<_> = rows
            .iter()
            .map(|row| row.get("被担保人名称").unwrap().as_leaf().unwrap().value.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["甲", "乙", "丙"]);

        let amounts: Vec<_> = rows
            .iter()
            .map(|row| row.get("担保金额").unwrap().as_leaf().unwrap().value.clone().unwrap())
            .collect();
        assert_eq!(amounts, vec!["100元", "200元", "300元"]);
    }

    #[test]
    fn test_no_candidate_attached_twice() {
        let config = guarantee_config();
        // Only one amount for three names.
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "被担保人名称：甲"),
            Element::paragraph(1, 0, "担保金额：100元"),
            Element::paragraph(2, 0, "被担保人名称：乙"),
            Element::paragraph(3, 0, "被担保人名称：丙"),
        ])
        .unwrap();
        let parent = config.field_at(&["担保".to_string()]).unwrap();
        let rows = group_rows(parent, &resolve_children(&config, &index), &index);
        let filled: Vec<bool> = rows
            .iter()
            .map(|row| !row.get("担保金额").unwrap().as_leaf().unwrap().is_null())
            .collect();
        assert_eq!(filled, vec![true, false, false]);
    }

    #[test]
    fn test_strict_group_drops_incomplete_rows() {
        let config = PredictorConfig::from_json(
            r#"[
            {"path": ["担保"], "sub_primary_key": ["被担保人名称"], "strict_group": true},
            {"path": ["担保", "被担保人名称"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
            {"path": ["担保", "担保金额"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["担保金额[:：](?P<dst>\\d+元)"]}]}
        ]"#,
        )
        .unwrap();
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "被担保人名称：甲"),
            Element::paragraph(1, 0, "担保金额：100元"),
            Element::paragraph(2, 0, "被担保人名称：乙"),
        ])
        .unwrap();
        let parent_path = vec!["担保".to_string()];
        let children: Vec<ChildResolution> = config
            .children_of(&parent_path)
            .into_iter()
            .map(|spec| ChildResolution {
                spec,
                resolved: run_chain(spec, &index),
            })
            .collect();
        let parent = config.field_at(&parent_path).unwrap();
        let rows = group_rows(parent, &children, &index);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_unit_from_value_element_wins() {
        let config = guarantee_config();
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "单位：万元"),
            Element::paragraph(1, 0, "被担保人名称：甲"),
            Element::paragraph(2, 0, "担保金额：100元"),
        ])
        .unwrap();
        let parent = config.field_at(&["担保".to_string()]).unwrap();
        let rows = group_rows(parent, &resolve_children(&config, &index), &index);
        let leaf = rows[0].get("担保金额").unwrap().as_leaf().unwrap().clone();
        // The value's own element carries 元, which beats the declaration.
        assert_eq!(leaf.values[0].unit.as_deref(), Some("元"));
        // The unit sibling is filled from the same resolution.
        let unit_leaf = rows[0].get("单位").unwrap().as_leaf().unwrap().clone();
        assert_eq!(unit_leaf.value.as_deref(), Some("元"));
    }

    #[test]
    fn test_unit_falls_back_to_preceding_declaration() {
        let config = PredictorConfig::from_json(
            r#"[
            {"path": ["担保"], "sub_primary_key": ["被担保人名称"],
             "unit_depend": {"担保金额": "单位"}},
            {"path": ["担保", "被担保人名称"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
            {"path": ["担保", "担保金额"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["担保金额[:：](?P<dst>\\d+)$"]}]},
            {"path": ["担保", "单位"], "models": []}
        ]"#,
        )
        .unwrap();
        let index = ElementIndex::from_elements(vec![
            Element::paragraph(0, 0, "单位：万元"),
            Element::paragraph(1, 0, "被担保人名称：甲"),
            Element::paragraph(2, 0, "担保金额：100"),
        ])
        .unwrap();
        let parent = config.field_at(&["担保".to_string()]).unwrap();
        let children: Vec<ChildResolution> = config
            .children_of(&["担保".to_string()])
            .into_iter()
            .map(|spec| ChildResolution {
                spec,
                resolved: run_chain(spec, &index),
            })
            .collect();
        let rows = group_rows(parent, &children, &index);
        let leaf = rows[0].get("担保金额").unwrap().as_leaf().unwrap().clone();
        assert_eq!(leaf.values[0].unit.as_deref(), Some("万元"));
    }
}

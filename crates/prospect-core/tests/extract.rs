//! End-to-end extraction scenarios over small synthetic documents.

use pretty_assertions::assert_eq;
use prospect_core::{extract, Element, ElementIndex, PredictorConfig, TableGrid};

fn index(elements: Vec<Element>) -> ElementIndex {
    ElementIndex::from_elements(elements).unwrap()
}

fn config(json: &str) -> PredictorConfig {
    PredictorConfig::from_json(json).unwrap()
}

#[test]
fn fixed_position_with_regex() {
    let index = index(vec![Element::paragraph(0, 0, "公司代码:600001 简称:ABC")]);
    let config = config(
        r#"[{"path": ["公司代码"],
             "models": [{"name": "fixed_position", "positions": [0, 1, 2],
                         "regs": ["代码[:：](?P<dst>\\d{6})"]}]}]"#,
    );
    let tree = extract(&config, &index);
    assert_eq!(tree.value(&["公司代码"]), Some("600001"));
}

#[test]
fn middle_paras_with_anchors() {
    let index = index(vec![
        Element::paragraph(0, 0, "目录"),
        Element::paragraph(1, 0, "基金的投资"),
        Element::paragraph(2, 0, "投资范围:A、B"),
        Element::paragraph(3, 0, "投资策略"),
    ]);
    let config = config(
        r#"[{"path": ["投资范围"],
             "multi": true,
             "models": [{"name": "middle_paras",
                         "top_anchor_regs": ["基金的投资"],
                         "bottom_anchor_regs": ["投资策略"],
                         "include_top_anchor": false}]}]"#,
    );
    let tree = extract(&config, &index);
    let leaf = tree.node(&["投资范围"]).unwrap().as_leaf().unwrap();
    assert_eq!(leaf.elements(), vec![2]);
}

#[test]
fn table_kv_with_neglect_row() {
    let index = index(vec![Element::table(
        0,
        0,
        TableGrid::from_rows(&[
            vec!["项目", "金额"],
            vec!["合计", "100"],
            vec!["利息", "30"],
        ]),
    )]);
    let config = config(
        r#"[{"path": ["利息"],
             "models": [{"name": "table_kv", "neglect_patterns": ["合计"]}]}]"#,
    );
    let tree = extract(&config, &index);
    assert_eq!(tree.value(&["利息"]), Some("30"));
}

#[test]
fn grouping_lookahead() {
    let index = index(vec![
        Element::paragraph(0, 0, "被担保人名称：甲"),
        Element::paragraph(1, 0, "担保金额：100万元"),
        Element::paragraph(2, 0, "被担保人名称：乙"),
        Element::paragraph(3, 0, "担保金额：200万元"),
        Element::paragraph(4, 0, "被担保人名称：丙"),
        Element::paragraph(5, 0, "担保金额：300万元"),
    ]);
    let config = config(
        r#"[
        {"path": ["担保"], "sub_primary_key": ["被担保人名称"]},
        {"path": ["担保", "被担保人名称"], "multi": true,
         "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
        {"path": ["担保", "担保金额"], "multi": true,
         "group": {"lookup_strategy": "lookahead", "range_num": 10},
         "models": [{"name": "partial_text", "regs": ["担保金额[:：](?P<dst>\\d+万元)"]}]}
    ]"#,
    );
    let tree = extract(&config, &index);
    let rows = tree.node(&["担保"]).unwrap().as_rows().unwrap();
    assert_eq!(rows.len(), 3);
    let pairs: Vec<(String, String)> = rows
        .iter()
        .map(|row| {
            (
                row.get("被担保人名称").unwrap().as_leaf().unwrap().value.clone().unwrap(),
                row.get("担保金额").unwrap().as_leaf().unwrap().value.clone().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("甲".to_string(), "100万元".to_string()),
            ("乙".to_string(), "200万元".to_string()),
            ("丙".to_string(), "300万元".to_string()),
        ]
    );
}

#[test]
fn fallback_chain_second_model_wins() {
    let index = index(vec![Element::paragraph(0, 0, "表决结果:同意9票")]);
    let config = config(
        r#"[{"path": ["表决结果"],
             "models": [{"name": "partial_text", "regs": ["不存在的前缀[:：](?P<dst>\\S+)"]},
                        {"name": "para_match", "paragraph_pattern": ["表决结果"],
                         "content_pattern": ["同意(?P<dst>\\d+)票"]}]}]"#,
    );
    let tree = extract(&config, &index);
    assert_eq!(tree.value(&["表决结果"]), Some("9"));

    let audit = tree.audit_for("表决结果").unwrap();
    assert_eq!(audit.model_candidates("partial_text"), Some(0));
    assert_eq!(audit.model_candidates("para_match"), Some(1));
}

#[test]
fn enum_post_map() {
    let applies = index(vec![Element::paragraph(0, 0, "√适用")]);
    let config_json = r#"[{"path": ["是否适用"],
         "enum": {"default": "否", "patterns": [["是", ["适用"]]]},
         "models": [{"name": "para_match", "paragraph_pattern": ["适用"]}]}]"#;
    let tree = extract(&config(config_json), &applies);
    assert_eq!(tree.value(&["是否适用"]), Some("是"));

    let negated = index(vec![Element::paragraph(0, 0, "不适用")]);
    let tree = extract(&config(config_json), &negated);
    assert_eq!(tree.value(&["是否适用"]), Some("否"));
}

#[test]
fn multi_candidates_keep_document_order() {
    let index = index(vec![
        Element::paragraph(0, 0, "金额：300元"),
        Element::paragraph(1, 0, "金额：100元"),
        Element::paragraph(2, 0, "金额：200元"),
    ]);
    let config = config(
        r#"[{"path": ["金额"], "multi": true,
             "models": [{"name": "partial_text", "regs": ["金额[:：](?P<dst>\\d+元)"]}]}]"#,
    );
    let tree = extract(&config, &index);
    let leaf = tree.node(&["金额"]).unwrap().as_leaf().unwrap();
    assert_eq!(leaf.elements(), vec![0, 1, 2]);
}

#[test]
fn extraction_is_deterministic() {
    let elements = vec![
        Element::paragraph(0, 0, "公司代码:600001"),
        Element::paragraph(1, 0, "被担保人名称：甲"),
        Element::paragraph(2, 0, "担保金额：100万元"),
        Element::table(
            3,
            0,
            TableGrid::from_rows(&[vec!["项目", "金额"], vec!["利息", "30"]]),
        ),
    ];
    let config = config(
        r#"[
        {"path": ["公司代码"],
         "models": [{"name": "fixed_position", "positions": [0], "regs": ["代码[:：](?P<dst>\\d{6})"]}]},
        {"path": ["利息"], "models": [{"name": "table_kv"}]},
        {"path": ["担保"], "sub_primary_key": ["被担保人名称"]},
        {"path": ["担保", "被担保人名称"], "multi": true,
         "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
        {"path": ["担保", "担保金额"], "multi": true,
         "models": [{"name": "partial_text", "regs": ["担保金额[:：](?P<dst>\\d+万元)"]}]}
    ]"#,
    );
    let index = index(elements);
    let first = serde_json::to_string(&extract(&config, &index)).unwrap();
    let second = serde_json::to_string(&extract(&config, &index)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn answer_tree_serializes_to_schema_shaped_json() {
    let index = index(vec![Element::paragraph(0, 0, "公司代码:600001")]);
    let config = config(
        r#"[{"path": ["基本信息", "公司代码"],
             "models": [{"name": "fixed_position", "positions": [0], "regs": ["代码[:：](?P<dst>\\d{6})"]}]}]"#,
    );
    let tree = extract(&config, &index);
    let json: serde_json::Value = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["root"]["基本信息"]["公司代码"]["value"], "600001");
    let sources = &json["root"]["基本信息"]["公司代码"]["values"][0]["sources"];
    assert_eq!(sources[0]["element"], 0);
}

#[test]
fn share_column_broadcasts_to_all_rows() {
    let index = index(vec![
        Element::paragraph(0, 0, "担保方式：连带责任保证"),
        Element::paragraph(1, 0, "被担保人名称：甲"),
        Element::paragraph(2, 0, "被担保人名称：乙"),
    ]);
    let config = config(
        r#"[
        {"path": ["担保"], "sub_primary_key": ["被担保人名称"]},
        {"path": ["担保", "被担保人名称"], "multi": true,
         "models": [{"name": "partial_text", "regs": ["被担保人名称[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]},
        {"path": ["担保", "担保方式"], "share_column": true,
         "models": [{"name": "partial_text", "regs": ["担保方式[:：](?P<dst>\\S+?)(?:[。；]|$)"]}]}
    ]"#,
    );
    let tree = extract(&config, &index);
    let rows = tree.node(&["担保"]).unwrap().as_rows().unwrap();
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(
            row.get("担保方式").unwrap().as_leaf().unwrap().value.as_deref(),
            Some("连带责任保证")
        );
    }
}

#[test]
fn relation_entity_voting_counts() {
    let index = index(vec![
        Element::paragraph(0, 0, "董事会表决情况:"),
        Element::paragraph(1, 0, "同意9票,反对0票,弃权1票。"),
    ]);
    let config = config(
        r#"[{"path": ["表决", "同意票数"], "multi": true,
             "models": [{"name": "relation_entity",
                         "relation_pattern": ["表决情况"],
                         "entities": [{"name": "同意", "regs": ["同意(?P<dst>\\d+)票"]}]}]}]"#,
    );
    let tree = extract(&config, &index);
    let leaf = tree.node(&["表决", "同意票数"]).unwrap().as_leaf().unwrap();
    assert_eq!(leaf.value.as_deref(), Some("9"));
    assert_eq!(leaf.values[0].entity.as_deref(), Some("同意"));
}

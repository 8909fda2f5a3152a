//! Predictor configuration: the declarative description of what to extract.
//!
//! A config is a list of field specs. Each spec names its answer-tree path,
//! an ordered model (resolver) list, and the grouping/dependency policies of
//! §4 of the design notes. Loading is strict: unknown resolver names,
//! malformed regexes, path conflicts and cyclic `depends` are all rejected
//! before any evaluation happens.

pub mod params;

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::pattern::PatternSet;
use crate::resolve::{FieldDefaults, ResolverSpec};

/// How answers from the model list are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStrategy {
    /// First model producing a non-empty result wins.
    #[default]
    First,
    /// All successful models contribute.
    All,
}

/// Direction for attaching non-key candidates to group rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStrategy {
    #[default]
    Lookahead,
    Lookbehind,
    Both,
}

/// Row-alignment policy of a grouped field.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupPolicy {
    #[serde(default)]
    pub lookup_strategy: LookupStrategy,
    #[serde(default = "default_range_num")]
    pub range_num: usize,
}

fn default_range_num() -> usize {
    10
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            lookup_strategy: LookupStrategy::default(),
            range_num: default_range_num(),
        }
    }
}

/// Post-mapping of raw candidate strings onto enum labels.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub default: Option<String>,
    patterns: Vec<(String, PatternSet)>,
}

impl EnumDef {
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct RawEnumDef {
            #[serde(default)]
            default: Option<String>,
            #[serde(default)]
            patterns: Vec<(String, Vec<String>)>,
        }
        let raw: RawEnumDef = serde_json::from_value(value.clone())
            .map_err(|err| ConfigError::Parse(format!("enum definition: {err}")))?;
        let mut patterns = Vec::with_capacity(raw.patterns.len());
        for (label, sources) in raw.patterns {
            patterns.push((label, PatternSet::compile(&sources)?));
        }
        Ok(Self {
            default: raw.default,
            patterns,
        })
    }

    /// Map a raw candidate string: first label whose any regex matches wins,
    /// else the default.
    ///
    /// A hit immediately preceded by a negation character (`不适用` against
    /// the pattern `适用`) does not count.
    pub fn map_value(&self, text: &str) -> Option<String> {
        const NEGATIONS: &[char] = &['不', '未', '无', '非', '否'];
        for (label, patterns) in &self.patterns {
            for regex in patterns.iter() {
                for hit in regex.find_iter(text) {
                    let negated = text[..hit.start()]
                        .chars()
                        .next_back()
                        .is_some_and(|c| NEGATIONS.contains(&c));
                    if !negated {
                        return Some(label.clone());
                    }
                }
            }
        }
        self.default.clone()
    }

    /// A label with no pattern backing (used by constant-valued fields).
    pub fn constant(label: impl Into<String>) -> Self {
        Self {
            default: Some(label.into()),
            patterns: Vec::new(),
        }
    }
}

/// One field of the predictor config.
#[derive(Debug)]
pub struct FieldSpec {
    /// Ordered key segments forming the answer-tree coordinate.
    pub path: Vec<String>,
    /// Child fields identifying a row of this list-valued field.
    pub sub_primary_key: Vec<String>,
    /// Ordered resolvers; the fallback chain walks these.
    pub models: Vec<ResolverSpec>,
    pub group: Option<GroupPolicy>,
    pub share_column: bool,
    /// value-field name → unit-field name.
    pub unit_depend: BTreeMap<String, String>,
    pub pick_answer_strategy: PickStrategy,
    pub strict_group: bool,
    /// Candidates must sit inside some syllabus subtree.
    pub need_syl: bool,
    /// Sibling fields that must be evaluated first.
    pub depends: Vec<String>,
    pub multi: bool,
    pub multi_elements: bool,
    pub enum_def: Option<EnumDef>,
}

impl FieldSpec {
    /// Last path segment: the field name.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Path segments joined by `|`; also the crude-answer key.
    pub fn path_key(&self) -> String {
        self.path.join("|")
    }

    /// Path of the parent field.
    pub fn parent_path(&self) -> &[String] {
        &self.path[..self.path.len().saturating_sub(1)]
    }
}

#[derive(Debug, Deserialize)]
struct RawFieldSpec {
    path: Vec<String>,
    #[serde(default)]
    sub_primary_key: Vec<String>,
    #[serde(default)]
    models: Vec<Map<String, Value>>,
    #[serde(default)]
    group: Option<GroupPolicy>,
    #[serde(default)]
    share_column: bool,
    #[serde(default)]
    unit_depend: BTreeMap<String, String>,
    #[serde(default)]
    pick_answer_strategy: PickStrategy,
    #[serde(default)]
    strict_group: bool,
    #[serde(default)]
    need_syl: bool,
    #[serde(default)]
    depends: Vec<String>,
    #[serde(default)]
    multi: bool,
    #[serde(default)]
    multi_elements: bool,
    #[serde(default, rename = "enum")]
    enum_def: Option<Value>,
}

/// A loaded, validated predictor configuration.
#[derive(Debug)]
pub struct PredictorConfig {
    pub fields: Vec<FieldSpec>,
}

impl PredictorConfig {
    /// Load from a JSON document: either a bare field list, or
    /// `{ "fields": [...], "enums": { field name: enum def } }`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let (raw_fields, enums) = match value {
            Value::Array(items) => (items, Map::new()),
            Value::Object(mut map) => {
                let fields = match map.remove("fields") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(ConfigError::Parse("missing fields list".to_string())),
                };
                let enums = match map.remove("enums") {
                    Some(Value::Object(enums)) => enums,
                    _ => Map::new(),
                };
                (fields, enums)
            }
            _ => return Err(ConfigError::Parse("config must be a list or object".to_string())),
        };

        let mut enum_defs: BTreeMap<String, EnumDef> = BTreeMap::new();
        for (name, value) in &enums {
            enum_defs.insert(name.clone(), EnumDef::from_value(value)?);
        }

        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let raw: RawFieldSpec = serde_json::from_value(raw)
                .map_err(|err| ConfigError::Parse(format!("field record: {err}")))?;
            fields.push(build_field(raw, &enum_defs)?);
        }

        let config = Self { fields };
        config.check_path_conflicts()?;
        config.check_depends()?;
        Ok(config)
    }

    fn check_path_conflicts(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.path.is_empty() {
                return Err(ConfigError::InvalidField {
                    field: String::new(),
                    reason: "empty path".to_string(),
                });
            }
            if !seen.insert(field.path_key()) {
                return Err(ConfigError::PathConflict(field.path_key()));
            }
        }
        Ok(())
    }

    /// Reject cyclic `depends` among sibling fields.
    fn check_depends(&self) -> Result<(), ConfigError> {
        // Group fields by parent path; depends only reference siblings.
        let mut siblings: BTreeMap<Vec<String>, Vec<&FieldSpec>> = BTreeMap::new();
        for field in &self.fields {
            siblings.entry(field.parent_path().to_vec()).or_default().push(field);
        }

        for group in siblings.values() {
            let names: BTreeMap<&str, &FieldSpec> =
                group.iter().map(|f| (f.name(), *f)).collect();
            for field in group {
                let mut visiting = vec![field.name()];
                if has_cycle(field, &names, &mut visiting) {
                    return Err(ConfigError::CyclicDepends(field.name().to_string()));
                }
            }
        }
        Ok(())
    }

    /// Fields directly under a parent path, config order.
    pub fn children_of(&self, parent: &[String]) -> Vec<&FieldSpec> {
        self.fields
            .iter()
            .filter(|f| f.path.len() == parent.len() + 1 && f.parent_path() == parent)
            .collect()
    }

    /// The spec at an exact path, if configured.
    pub fn field_at(&self, path: &[String]) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.path == path)
    }
}

fn has_cycle<'a>(
    field: &'a FieldSpec,
    names: &BTreeMap<&'a str, &'a FieldSpec>,
    visiting: &mut Vec<&'a str>,
) -> bool {
    for dep in &field.depends {
        if visiting.contains(&dep.as_str()) {
            return true;
        }
        if let Some(next) = names.get(dep.as_str()) {
            visiting.push(dep.as_str());
            if has_cycle(next, names, visiting) {
                return true;
            }
            visiting.pop();
        }
    }
    false
}

fn build_field(
    raw: RawFieldSpec,
    enum_defs: &BTreeMap<String, EnumDef>,
) -> Result<FieldSpec, ConfigError> {
    let name = raw.path.last().cloned().unwrap_or_default();
    let enum_def = match &raw.enum_def {
        Some(value) => Some(EnumDef::from_value(value)?),
        None => enum_defs.get(&name).cloned(),
    };
    let defaults = FieldDefaults {
        multi: raw.multi,
        multi_elements: raw.multi_elements,
    };

    let mut models = Vec::with_capacity(raw.models.len());
    for params in &raw.models {
        let model_name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::InvalidField {
                field: name.clone(),
                reason: "model entry without name".to_string(),
            })?;
        models.push(ResolverSpec::build(model_name, params, &defaults, &name)?);
    }

    Ok(FieldSpec {
        path: raw.path,
        sub_primary_key: raw.sub_primary_key,
        models,
        group: raw.group,
        share_column: raw.share_column,
        unit_depend: raw.unit_depend,
        pick_answer_strategy: raw.pick_answer_strategy,
        strict_group: raw.strict_group,
        need_syl: raw.need_syl,
        depends: raw.depends,
        multi: raw.multi,
        multi_elements: raw.multi_elements,
        enum_def,
    })
}

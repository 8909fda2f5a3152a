//! Typed access to resolver parameter maps.
//!
//! A model entry in the predictor config is a tagged variant: `name` selects
//! the resolver, the remaining keys are that resolver's schema. Each
//! resolver pulls its parameters through a [`ParamReader`], which records
//! what was consumed so that unknown parameters can be warned about and
//! ignored (unknown resolver *names* are fatal instead).

use std::cell::RefCell;
use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ConfigError;
use crate::pattern::PatternSet;

pub struct ParamReader<'a> {
    params: &'a Map<String, Value>,
    consumed: RefCell<BTreeSet<String>>,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Map<String, Value>) -> Self {
        Self {
            params,
            consumed: RefCell::new(BTreeSet::new()),
        }
    }

    fn take(&self, key: &str) -> Option<&'a Value> {
        let value = self.params.get(key);
        if value.is_some() {
            self.consumed.borrow_mut().insert(key.to_string());
        }
        value
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.take(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn bool_opt(&self, key: &str) -> Option<bool> {
        self.take(key).and_then(Value::as_bool)
    }

    pub fn usize(&self, key: &str, default: usize) -> usize {
        self.take(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn usize_opt(&self, key: &str) -> Option<usize> {
        self.take(key).and_then(Value::as_u64).map(|v| v as usize)
    }

    pub fn f32(&self, key: &str, default: f32) -> f32 {
        self.take(key)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(default)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.take(key).and_then(Value::as_str).map(str::to_string)
    }

    /// A list of strings; a lone string is accepted as a one-element list.
    pub fn str_list(&self, key: &str) -> Vec<String> {
        match self.take(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Signed integer list (positions and pages allow negatives).
    pub fn i64_list(&self, key: &str) -> Vec<i64> {
        match self.take(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
            Some(value) => value.as_i64().map(|v| vec![v]).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Compile a regex-list parameter. Missing key = empty set.
    pub fn patterns(&self, key: &str) -> Result<PatternSet, ConfigError> {
        PatternSet::compile(&self.str_list(key))
    }

    /// The raw value of a structured parameter.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.take(key)
    }

    /// Warn about any parameter that no reader consumed.
    pub fn finish(&self, resolver: &str, field: &str) {
        let consumed = self.consumed.borrow();
        for key in self.params.keys() {
            if key != "name" && !consumed.contains(key) {
                warn!(resolver, field, param = %key, "ignoring unknown resolver parameter");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_typed_access_with_defaults() {
        let params = map(r#"{"multi": true, "range_num": 5, "regs": ["a", "b"], "one": "x"}"#);
        let reader = ParamReader::new(&params);
        assert!(reader.bool("multi", false));
        assert!(!reader.bool("missing", false));
        assert_eq!(reader.usize("range_num", 10), 5);
        assert_eq!(reader.str_list("regs"), vec!["a", "b"]);
        assert_eq!(reader.str_list("one"), vec!["x"]);
    }

    #[test]
    fn test_patterns_compile_failure_is_fatal() {
        let params = map(r#"{"regs": ["("]}"#);
        let reader = ParamReader::new(&params);
        assert!(reader.patterns("regs").is_err());
    }

    #[test]
    fn test_negative_positions() {
        let params = map(r#"{"positions": [0, -1]}"#);
        let reader = ParamReader::new(&params);
        assert_eq!(reader.i64_list("positions"), vec![0, -1]);
    }
}

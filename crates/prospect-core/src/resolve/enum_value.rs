//! Constant enum answers.
//!
//! Some fields are implied by the schema context rather than the document
//! (a sub-schema that only applies to one exchange, say). This resolver
//! emits the configured label without consulting any element.

use crate::element::index::ElementIndex;
use crate::error::ConfigError;
use crate::resolve::{Candidate, FieldContext};
use crate::schema::params::ParamReader;

#[derive(Debug)]
pub struct EnumValue {
    value: Option<String>,
}

impl EnumValue {
    pub fn from_params(reader: &ParamReader<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            value: reader.string("value"),
        })
    }

    pub fn resolve(&self, _ctx: FieldContext<'_>, _index: &ElementIndex) -> Vec<Candidate> {
        self.value
            .as_deref()
            .map(|value| vec![Candidate::constant(value)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    #[test]
    fn test_constant_value() {
        let params: Map<String, Value> = serde_json::from_str(r#"{"value": "上海证券交易所"}"#).unwrap();
        let reader = ParamReader::new(&params);
        let resolver = EnumValue::from_params(&reader).unwrap();
        let index = ElementIndex::from_elements(Vec::new()).unwrap();
        let ctx = FieldContext {
            name: "上市地",
            path_key: "上市地",
        };
        let candidates = resolver.resolve(ctx, &index);
        assert_eq!(candidates[0].value.as_deref(), Some("上海证券交易所"));
        assert_eq!(candidates[0].element, None);
    }
}

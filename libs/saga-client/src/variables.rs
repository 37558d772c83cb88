//! Typed-variable codec for the workflow engine.
//!
//! The engine transports variables as `{"value": ..., "type": ...}` maps.
//! Decoding unwraps values and revives JSON objects/arrays that arrive as
//! strings; encoding assigns explicit types (Boolean, Integer, Double, Json,
//! String, Null) so the engine stores them correctly.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::SagaClientError;

/// Decoded process variables keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_uuid(&self, name: &str) -> Result<Uuid, SagaClientError> {
        self.get_str(name)
            .ok_or_else(|| SagaClientError::Codec(format!("missing variable '{name}'")))
            .and_then(|s| {
                Uuid::parse_str(s)
                    .map_err(|e| SagaClientError::Codec(format!("variable '{name}': {e}")))
            })
    }

    /// Uuid list from a Json-typed array variable. A missing variable is an
    /// empty list; a scalar is treated as a single-element list.
    pub fn get_uuid_list(&self, name: &str) -> Result<Vec<Uuid>, SagaClientError> {
        let Some(value) = self.get(name) else {
            return Ok(Vec::new());
        };

        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            scalar => vec![scalar],
        };

        items
            .into_iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| {
                        SagaClientError::Codec(format!("variable '{name}' is not a string list"))
                    })
                    .and_then(|s| {
                        Uuid::parse_str(s).map_err(|e| {
                            SagaClientError::Codec(format!("variable '{name}': {e}"))
                        })
                    })
            })
            .collect()
    }

    /// Decode the engine's typed-variable map.
    pub fn decode(raw: &Map<String, Value>) -> Self {
        let mut out = BTreeMap::new();
        for (name, typed) in raw {
            let value = typed.get("value").cloned().unwrap_or(Value::Null);
            out.insert(name.clone(), revive_json_string(value));
        }
        Self(out)
    }

    /// Encode into the engine's typed-variable map.
    pub fn encode(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, value) in &self.0 {
            out.insert(name.clone(), encode_value(value));
        }
        out
    }
}

/// Engine Object variables may come back as JSON strings; revive them.
fn revive_json_string(value: Value) -> Value {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if (trimmed.starts_with('[') && trimmed.ends_with(']'))
            || (trimmed.starts_with('{') && trimmed.ends_with('}'))
        {
            if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                return parsed;
            }
        }
    }
    value
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Bool(b) => serde_json::json!({"value": b, "type": "Boolean"}),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            serde_json::json!({"value": n, "type": "Integer"})
        }
        Value::Number(n) => serde_json::json!({"value": n, "type": "Double"}),
        Value::Array(_) | Value::Object(_) => {
            serde_json::json!({"value": value.to_string(), "type": "Json"})
        }
        Value::Null => serde_json::json!({"value": null, "type": "Null"}),
        Value::String(s) => serde_json::json!({"value": s, "type": "String"}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_unwraps_values_and_revives_json_strings() {
        let raw = serde_json::json!({
            "offeringId": {"value": "8c1d2a34-aaaa-bbbb-cccc-111122223333", "type": "String"},
            "pricingIds": {"value": "[\"6f9619ff-8b86-d011-b42d-00c04fc964ff\"]", "type": "Json"},
            "attempt": {"value": 2, "type": "Integer"},
        });
        let vars = Variables::decode(raw.as_object().unwrap());

        assert_eq!(
            vars.get_str("offeringId"),
            Some("8c1d2a34-aaaa-bbbb-cccc-111122223333")
        );
        assert_eq!(vars.get_uuid_list("pricingIds").unwrap().len(), 1);
        assert_eq!(vars.get("attempt"), Some(&Value::from(2)));
    }

    #[test]
    fn decode_keeps_non_json_strings_verbatim() {
        let raw = serde_json::json!({
            "note": {"value": "[not json", "type": "String"},
        });
        let vars = Variables::decode(raw.as_object().unwrap());
        assert_eq!(vars.get_str("note"), Some("[not json"));
    }

    #[test]
    fn encode_assigns_explicit_types() {
        let vars = Variables::new()
            .set("done", true)
            .set("count", 3)
            .set("ratio", 0.5)
            .set("name", "basic")
            .set("ids", serde_json::json!(["a", "b"]))
            .set("missing", Value::Null);

        let encoded = vars.encode();
        assert_eq!(encoded["done"]["type"], "Boolean");
        assert_eq!(encoded["count"]["type"], "Integer");
        assert_eq!(encoded["ratio"]["type"], "Double");
        assert_eq!(encoded["name"]["type"], "String");
        assert_eq!(encoded["ids"]["type"], "Json");
        assert_eq!(encoded["ids"]["value"], "[\"a\",\"b\"]");
        assert_eq!(encoded["missing"]["type"], "Null");
    }

    #[test]
    fn uuid_list_tolerates_scalar_and_missing() {
        let vars = Variables::new().set(
            "pricingIds",
            Value::String("6f9619ff-8b86-d011-b42d-00c04fc964ff".into()),
        );
        assert_eq!(vars.get_uuid_list("pricingIds").unwrap().len(), 1);
        assert!(vars.get_uuid_list("specificationIds").unwrap().is_empty());
    }

    #[test]
    fn missing_uuid_is_an_error() {
        let vars = Variables::new();
        assert!(vars.get_uuid("offeringId").is_err());
    }
}

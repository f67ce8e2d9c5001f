use bson::Bson;

use super::FieldType;
use crate::{error::CoercionError, value::Value};

/// Stores any JSON-compatible value as JSON text.
///
/// Reading back yields the structured form: objects become maps and arrays become lists.
#[derive(Debug, Clone, Default)]
pub struct JsonField;

impl JsonField {
    pub fn new() -> Self {
        JsonField
    }
}

impl FieldType for JsonField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        let json = value
            .to_json()
            .ok_or_else(|| CoercionError::expected("a JSON-compatible value", value.type_name()))?;

        serde_json::to_string(&json)
            .map(Bson::String)
            .map_err(|err| CoercionError(err.to_string()))
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::String(text) => serde_json::from_str::<serde_json::Value>(&text)
                .map(Value::from_json)
                .map_err(|err| CoercionError(format!("invalid JSON text: {err}"))),
            native => Ok(Value::from_bson(native)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        value.to_json().is_some()
    }
}

/// Stores string-keyed maps as nested documents. Lists are stored as arrays.
#[derive(Debug, Clone, Default)]
pub struct DictField;

impl DictField {
    pub fn new() -> Self {
        DictField
    }
}

impl FieldType for DictField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Map(_) | Value::List(_) | Value::Document(_) => Ok(value.to_bson()),
            Value::Json(json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                Ok(Value::from_json(json.clone()).to_bson())
            }
            other => Err(CoercionError::expected("a mapping", other.type_name())),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Document(_) | Bson::Array(_) => Ok(Value::from_bson(value)),
            other => Err(CoercionError::expected("a mapping", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_) | Value::List(_))
    }

    fn is_empty(&self, value: &Value) -> bool {
        match value {
            Value::Map(map) => map.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bson::doc;
    use serde_json::json;

    use super::*;

    #[test]
    fn json_is_stored_as_text_and_read_back_structured() {
        let field = JsonField::new();

        let stored = field.to_storage(&Value::from(json!({ "a": [1, 2], "b": "x" }))).unwrap();

        assert_eq!(stored, Bson::String(r#"{"a":[1,2],"b":"x"}"#.into()));
        assert_eq!(
            field.from_storage(stored),
            Ok(Value::Map(BTreeMap::from([
                ("a".to_string(), Value::from(vec![1, 2])),
                ("b".to_string(), Value::from("x")),
            ])))
        );
    }

    #[test]
    fn json_rejects_values_without_a_json_form() {
        let field = JsonField::new();

        assert!(field.to_storage(&Value::from(uuid::Uuid::new_v4())).is_err());
        assert!(!field.validate(&Value::Float(f64::NAN)));
        assert!(field.validate(&Value::from(vec!["a", "b"])));
    }

    #[test]
    fn json_tolerates_native_storage() {
        assert_eq!(JsonField.from_storage(Bson::Int32(3)), Ok(Value::Int(3)));
        assert!(JsonField.from_storage(Bson::String("{".into())).is_err());
    }

    #[test]
    fn dict_is_stored_as_a_document() {
        let field = DictField::new();
        let value = Value::Map(BTreeMap::from([("k".to_string(), Value::Int(1))]));

        let stored = field.to_storage(&value).unwrap();

        assert_eq!(stored, Bson::Document(doc! { "k": 1 }));
        assert_eq!(field.from_storage(stored), Ok(value));
        assert!(field.is_empty(&Value::Map(BTreeMap::new())));
        assert!(field.to_storage(&Value::from("k")).is_err());
    }
}

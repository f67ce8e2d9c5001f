use std::str::FromStr;

use bson::{Bson, oid::ObjectId, spec::BinarySubtype};
use uuid::Uuid;

use super::FieldType;
use crate::{
    error::CoercionError,
    value::{Value, uuid_to_bson},
};

/// Stores UUIDs as binary with the UUID subtype. Textual UUIDs are accepted.
#[derive(Debug, Clone, Default)]
pub struct UuidField;

impl UuidField {
    pub fn new() -> Self {
        UuidField
    }
}

impl FieldType for UuidField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Uuid(uuid) => Ok(uuid_to_bson(uuid)),
            Value::String(s) => Uuid::from_str(s.trim())
                .map(|uuid| uuid_to_bson(&uuid))
                .map_err(|_| CoercionError::expected("a UUID", value)),
            other => Err(CoercionError::expected("a UUID", other)),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Binary(binary) if matches!(binary.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld) => {
                Uuid::from_slice(&binary.bytes)
                    .map(Value::Uuid)
                    .map_err(|_| CoercionError::expected("16 UUID bytes", binary.bytes.len()))
            }
            Bson::String(s) => Uuid::from_str(s.trim())
                .map(Value::Uuid)
                .map_err(|_| CoercionError::expected("a UUID", s)),
            other => Err(CoercionError::expected("a UUID", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Uuid(_) => true,
            Value::String(s) => Uuid::from_str(s.trim()).is_ok(),
            _ => false,
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        matches!(value, Value::String(s) if s.is_empty())
    }
}

/// Stores the store's native object identifiers. No coercion is performed.
#[derive(Debug, Clone, Default)]
pub struct ObjectIdField;

impl ObjectIdField {
    pub fn new() -> Self {
        ObjectIdField
    }
}

impl FieldType for ObjectIdField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::ObjectId(id) | Value::Reference(id) => Ok(Bson::ObjectId(*id)),
            other => Err(CoercionError::expected("an object id", other)),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::ObjectId(id) => Ok(Value::ObjectId(id)),
            Bson::String(s) => ObjectId::parse_str(&s)
                .map(Value::ObjectId)
                .map_err(|_| CoercionError::expected("an object id", s)),
            other => Err(CoercionError::expected("an object id", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::ObjectId(_))
    }
}

#[cfg(test)]
mod tests {
    use bson::Binary;

    use super::*;

    #[test]
    fn textual_uuid_is_stored_as_binary() {
        let id = Uuid::new_v4();

        let stored = UuidField.to_storage(&Value::from(id.to_string())).unwrap();

        assert_eq!(stored, uuid_to_bson(&id));
        assert_eq!(UuidField.from_storage(stored), Ok(Value::Uuid(id)));
    }

    #[test]
    fn malformed_uuid_is_rejected() {
        assert!(UuidField.to_storage(&Value::from("not-a-uuid")).is_err());
        assert!(UuidField.to_storage(&Value::Int(4)).is_err());
        assert!(!UuidField.validate(&Value::from("not-a-uuid")));
        assert!(UuidField.validate(&Value::from(Uuid::new_v4().to_string())));
    }

    #[test]
    fn uuid_reads_legacy_forms() {
        let id = Uuid::new_v4();
        let legacy = Bson::Binary(Binary { subtype: BinarySubtype::UuidOld, bytes: id.as_bytes().to_vec() });

        assert_eq!(UuidField.from_storage(legacy), Ok(Value::Uuid(id)));
        assert_eq!(UuidField.from_storage(Bson::String(id.to_string())), Ok(Value::Uuid(id)));
    }

    #[test]
    fn empty_uuid_text_is_empty() {
        assert!(UuidField.is_empty(&Value::from("")));
        assert!(!UuidField.is_empty(&Value::Uuid(Uuid::nil())));
    }

    #[test]
    fn object_id_is_not_coerced() {
        let id = ObjectId::new();

        assert_eq!(ObjectIdField.to_storage(&Value::ObjectId(id)), Ok(Bson::ObjectId(id)));
        assert!(ObjectIdField.to_storage(&Value::from(id.to_hex())).is_err());
        assert!(ObjectIdField.validate(&Value::ObjectId(id)));
        assert!(!ObjectIdField.validate(&Value::from(id.to_hex())));
    }
}

use bson::{Binary, Bson, spec::BinarySubtype};

use super::FieldType;
use crate::{error::CoercionError, value::Value};

/// Stores raw bytes, optionally bounded in size.
///
/// Text is stored as its UTF-8 bytes and lists of integers as one byte per element.
#[derive(Debug, Clone, Default)]
pub struct BinaryField {
    max_bytes: Option<usize>,
}

impl BinaryField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    fn coerce(value: &Value) -> Result<Vec<u8>, CoercionError> {
        match value {
            Value::Binary(bytes) => Ok(bytes.clone()),
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_int()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| CoercionError::expected("a byte", item))
                })
                .collect(),
            other => Err(CoercionError::expected("bytes", other)),
        }
    }
}

impl FieldType for BinaryField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        Ok(Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes: Self::coerce(value)? }))
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Binary(binary) => Ok(Value::Binary(binary.bytes)),
            Bson::String(s) => Ok(Value::Binary(s.into_bytes())),
            other => Err(CoercionError::expected("bytes", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Binary(bytes) => self.max_bytes.is_none_or(|max| bytes.len() <= max),
            _ => false,
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        matches!(value, Value::Binary(bytes) if bytes.is_empty())
    }
}

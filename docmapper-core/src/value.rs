//! Native values held by documents before they are coerced into storage form.
//!
//! [`Value`] is the in-memory representation of a field. Field kinds convert it to and from
//! [`Bson`] through [`FieldType`](crate::field::FieldType). Values that belong to no declared
//! field (dynamic keys, raw filter operands) go through the untyped conversions on this type.

use std::collections::BTreeMap;

use bson::{Binary, Bson, Document, oid::ObjectId, spec::BinarySubtype};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A native field value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Binary(Vec<u8>),
    /// An arbitrary JSON value, accepted by JSON and dict fields.
    Json(serde_json::Value),
    ObjectId(ObjectId),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// An embedded document instance.
    Document(Record),
    /// A pointer to a record in another collection.
    Reference(ObjectId),
}

impl Value {
    /// Wraps raw bytes. Kept apart from the `From` impls so `Vec<u8>` is not mistaken for a list.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Binary(bytes.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Document(record) => Some(record),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Uuid(_) => "uuid",
            Value::Binary(_) => "binary",
            Value::Json(_) => "json",
            Value::ObjectId(_) => "object id",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Document(_) => "document",
            Value::Reference(_) => "reference",
        }
    }

    /// Converts a value with no field declaration attached to it.
    ///
    /// Integers are stored as 32-bit when they fit, the same way the MongoDB drivers do.
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int(n) => int_to_bson(*n),
            Value::Float(f) => Bson::Double(*f),
            Value::Decimal(d) => Bson::String(d.to_string()),
            Value::String(s) => Bson::String(s.clone()),
            Value::DateTime(dt) => Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis())),
            Value::Uuid(u) => uuid_to_bson(u),
            Value::Binary(bytes) => Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes: bytes.clone() }),
            Value::Json(json) => Value::from_json(json.clone()).to_bson(),
            Value::ObjectId(id) | Value::Reference(id) => Bson::ObjectId(*id),
            Value::List(items) => Bson::Array(items.iter().map(Value::to_bson).collect()),
            Value::Map(map) => Bson::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_bson()))
                    .collect(),
            ),
            Value::Document(record) => Bson::Document(
                record
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_bson()))
                    .collect(),
            ),
        }
    }

    /// Reads a stored value with no field declaration attached to it.
    pub fn from_bson(bson: Bson) -> Value {
        match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(b) => Value::Bool(b),
            Bson::Int32(n) => Value::Int(n as i64),
            Bson::Int64(n) => Value::Int(n),
            Bson::Double(f) => Value::Float(f),
            Bson::String(s) => Value::String(s),
            Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            Bson::ObjectId(id) => Value::ObjectId(id),
            Bson::Binary(binary) => match binary.subtype {
                BinarySubtype::Uuid | BinarySubtype::UuidOld => Uuid::from_slice(&binary.bytes)
                    .map(Value::Uuid)
                    .unwrap_or(Value::Binary(binary.bytes)),
                _ => Value::Binary(binary.bytes),
            },
            Bson::Array(items) => Value::List(items.into_iter().map(Value::from_bson).collect()),
            Bson::Document(doc) => Value::Map(
                doc.into_iter()
                    .map(|(k, v)| (k, Value::from_bson(v)))
                    .collect(),
            ),
            other => Value::String(other.to_string()),
        }
    }

    /// Converts to a JSON value, or `None` when the value has no JSON representation.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        Some(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => Json::Number(serde_json::Number::from_f64(*f)?),
            Value::String(s) => Json::String(s.clone()),
            Value::Json(json) => json.clone(),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Decimal(_)
            | Value::DateTime(_)
            | Value::Uuid(_)
            | Value::Binary(_)
            | Value::ObjectId(_)
            | Value::Document(_)
            | Value::Reference(_) => return None,
        })
    }

    /// Builds a structured value out of JSON: objects become maps, arrays become lists.
    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

pub(crate) fn int_to_bson(n: i64) -> Bson {
    i32::try_from(n)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(n))
}

pub(crate) fn uuid_to_bson(uuid: &Uuid) -> Bson {
    Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes: uuid.as_bytes().to_vec() })
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => String,
    &str => String,
    DateTime<Utc> => DateTime,
    Uuid => Uuid,
    serde_json::Value => Json,
    ObjectId => ObjectId,
    BTreeMap<String, Value> => Map,
    Record => Document,
}

/// Reads a document untyped, as a map.
impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::from_bson(Bson::Document(document))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The field values of one document, keyed by logical field name.
///
/// The identifier lives under the `_id` key once the document has been stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub const ID: &'static str = "_id";

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value and returns the record, for building records inline.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The stored identifier, if this record has been saved.
    pub fn id(&self) -> Option<ObjectId> {
        match self.values.get(Self::ID) {
            Some(Value::ObjectId(id)) | Some(Value::Reference(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        record
            .values
            .into_iter()
            .map(|(k, v)| (k, v.to_bson()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn integers_use_the_narrowest_width() {
        assert_eq!(Value::Int(7).to_bson(), Bson::Int32(7));
        assert_eq!(Value::Int(i64::MAX).to_bson(), Bson::Int64(i64::MAX));
    }

    #[test]
    fn untyped_conversion_keeps_nested_structure() {
        let value = Value::from(Record::new().with("a", 1).with("tags", vec!["x", "y"]));

        assert_eq!(value.to_bson(), Bson::Document(doc! { "a": 1, "tags": ["x", "y"] }));
    }

    #[test]
    fn uuid_binary_reads_back_as_uuid() {
        let id = Uuid::new_v4();

        assert_eq!(Value::from_bson(Value::Uuid(id).to_bson()), Value::Uuid(id));
    }

    #[test]
    fn json_conversion_rejects_non_json_values() {
        assert!(Value::ObjectId(ObjectId::new()).to_json().is_none());
        assert!(Value::Float(f64::NAN).to_json().is_none());
        assert_eq!(
            Value::from(vec![1, 2]).to_json(),
            Some(serde_json::json!([1, 2]))
        );
    }
}

use std::sync::Arc;

use bson::Bson;

use super::{FieldKind, FieldType};
use crate::{
    error::CoercionError,
    schema::DocumentType,
    value::{Record, Value},
};

/// Stores a list whose elements are handled by an item kind.
#[derive(Debug, Clone)]
pub struct ListField {
    item: Box<FieldKind>,
}

impl ListField {
    pub fn new(item: impl Into<FieldKind>) -> Self {
        Self { item: Box::new(item.into()) }
    }

    pub fn item(&self) -> &FieldKind {
        &self.item
    }
}

impl FieldType for ListField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| self.item.to_storage(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Bson::Array),
            other => Err(CoercionError::expected("a list", other.type_name())),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Array(items) => items
                .into_iter()
                .map(|item| self.item.from_storage(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(CoercionError::expected("a list", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::List(items) => items.iter().all(|item| self.item.validate(item)),
            _ => false,
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        matches!(value, Value::List(items) if items.is_empty())
    }
}

/// Stores a nested document of another document type, under that type's storage names.
#[derive(Debug, Clone)]
pub struct EmbeddedDocumentField {
    document_type: Arc<DocumentType>,
}

impl EmbeddedDocumentField {
    pub fn new(document_type: Arc<DocumentType>) -> Self {
        Self { document_type }
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }
}

fn record_of(value: &Value) -> Option<Record> {
    match value {
        Value::Document(record) => Some(record.clone()),
        Value::Map(map) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        _ => None,
    }
}

impl FieldType for EmbeddedDocumentField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        let record = record_of(value)
            .ok_or_else(|| CoercionError::expected("an embedded document", value.type_name()))?;

        self.document_type
            .to_storage(&record)
            .map(Bson::Document)
            .map_err(|err| CoercionError(err.to_string()))
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::Document(doc) => self
                .document_type
                .from_storage(doc)
                .map(Value::Document)
                .map_err(|err| CoercionError(err.to_string())),
            other => Err(CoercionError::expected("an embedded document", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Document(record) => self.document_type.validate(record).is_ok(),
            _ => false,
        }
    }
}

/// Stores a pointer to a record of another document type as its object id.
///
/// A loaded record is accepted on the way in as long as it has been saved.
#[derive(Debug, Clone)]
pub struct ReferenceField {
    document_type: Arc<DocumentType>,
}

impl ReferenceField {
    pub fn new(document_type: Arc<DocumentType>) -> Self {
        Self { document_type }
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }
}

impl FieldType for ReferenceField {
    fn to_storage(&self, value: &Value) -> Result<Bson, CoercionError> {
        match value {
            Value::Reference(id) | Value::ObjectId(id) => Ok(Bson::ObjectId(*id)),
            Value::Document(record) => record.id().map(Bson::ObjectId).ok_or_else(|| {
                CoercionError(format!("a {} must be saved before it can be referenced", self.document_type.name()))
            }),
            other => Err(CoercionError::expected("a reference", other.type_name())),
        }
    }

    fn from_storage(&self, value: Bson) -> Result<Value, CoercionError> {
        match value {
            Bson::ObjectId(id) => Ok(Value::Reference(id)),
            Bson::Document(doc) => match doc.get("_id").or_else(|| doc.get("$id")) {
                Some(Bson::ObjectId(id)) => Ok(Value::Reference(*id)),
                _ => Err(CoercionError::expected("a reference", &doc)),
            },
            other => Err(CoercionError::expected("a reference", other)),
        }
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Reference(_) | Value::ObjectId(_) => true,
            Value::Document(record) => record.id().is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;
    use crate::field::{Field, IntField, StringField};

    fn address() -> Arc<DocumentType> {
        DocumentType::builder("Address")
            .field(Field::new("city", StringField::new()).db_field("c").required())
            .field(Field::new("number", IntField::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn list_items_use_the_item_kind() {
        let field = ListField::new(IntField::new());

        let stored = field.to_storage(&Value::from(vec![Value::Int(1), Value::from("2")])).unwrap();

        assert_eq!(stored, Bson::Array(vec![Bson::Int32(1), Bson::Int32(2)]));
        assert_eq!(field.from_storage(stored), Ok(Value::from(vec![1, 2])));
        assert!(field.is_empty(&Value::List(Vec::new())));
        assert!(!field.validate(&Value::from(vec![Value::from("x")])));
    }

    #[test]
    fn embedded_documents_use_the_embedded_storage_names() {
        let field = EmbeddedDocumentField::new(address());
        let record = Record::new().with("city", "Rio").with("number", 10);

        let stored = field.to_storage(&Value::from(record.clone())).unwrap();

        assert_eq!(stored, Bson::Document(doc! { "c": "Rio", "number": 10 }));
        assert_eq!(field.from_storage(stored), Ok(Value::from(record)));
    }

    #[test]
    fn embedded_validation_follows_the_embedded_type() {
        let field = EmbeddedDocumentField::new(address());

        assert!(field.validate(&Value::from(Record::new().with("city", "Rio"))));
        assert!(!field.validate(&Value::from(Record::new().with("number", 1))));
    }

    #[test]
    fn references_store_the_identifier() {
        let field = ReferenceField::new(address());
        let id = ObjectId::new();

        assert_eq!(field.to_storage(&Value::Reference(id)), Ok(Bson::ObjectId(id)));
        assert_eq!(
            field.to_storage(&Value::from(Record::new().with(Record::ID, id))),
            Ok(Bson::ObjectId(id))
        );
        assert!(field.to_storage(&Value::from(Record::new())).is_err());
        assert_eq!(field.from_storage(Bson::ObjectId(id)), Ok(Value::Reference(id)));
    }
}

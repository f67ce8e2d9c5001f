#![allow(dead_code)]

use std::sync::Arc;

use docmapper::{memory::InMemoryStore, prelude::*};

pub fn address_type() -> Arc<DocumentType> {
    DocumentType::builder("Address")
        .field(Field::new("city", StringField::new()).db_field("c"))
        .field(Field::new("zip", StringField::new()))
        .build()
        .unwrap()
}

pub fn order_type() -> Arc<DocumentType> {
    DocumentType::builder("Order")
        .field(Field::new("sku", StringField::new()).db_field("s"))
        .field(Field::new("qty", IntField::new()))
        .build()
        .unwrap()
}

pub fn person_type() -> Arc<DocumentType> {
    DocumentType::builder("Person")
        .collection("people")
        .field(Field::new("name", StringField::new().max_length(50)).db_field("n").required())
        .field(Field::new("age", IntField::new()))
        .field(Field::new("external_id", UuidField::new()))
        .field(Field::new("tags", ListField::new(StringField::new())))
        .field(Field::new("address", EmbeddedDocumentField::new(address_type())))
        .field(Field::new("orders", ListField::new(EmbeddedDocumentField::new(order_type()))))
        .build()
        .unwrap()
}

pub async fn memory_store() -> DocumentStore<InMemoryStore> {
    DocumentStore::new(InMemoryStore::builder().build().await.unwrap())
}

pub fn person(name: &str, age: i64) -> Record {
    Record::new().with("name", name).with("age", age)
}

/// Names of the records, in result order.
pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.get("name").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

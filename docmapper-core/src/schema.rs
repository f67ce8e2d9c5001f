//! Document types: the read-only field registry the mapper and the query compiler work against.
//!
//! A [`DocumentType`] is built once through [`DocumentType::builder`] and shared behind an
//! [`Arc`] afterwards. It resolves logical field paths, converts whole records between their
//! native and storage forms, and prepares and validates records before they are saved.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! let address = DocumentType::builder("Address")
//!     .field(Field::new("city", StringField::new()).db_field("c"))
//!     .build()?;
//!
//! let user = DocumentType::builder("User")
//!     .collection("users")
//!     .field(Field::new("email", EmailField::new()).required().unique())
//!     .field(Field::new("address", EmbeddedDocumentField::new(address)))
//!     .build()?;
//!
//! assert_eq!(user.storage_path("address.city")?, "address.c");
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use bson::Document;

use crate::{
    error::{MapperError, MapperResult},
    field::{DateTimeField, Field, FieldKind, ObjectIdField},
    value::{Record, Value},
};

/// One resolved segment of a logical field path.
#[derive(Debug, Clone)]
pub enum PathSegment<'a> {
    /// The segment names a declared field.
    Field(&'a Field),
    /// The segment names nothing declared and passes through literally.
    Dynamic(String),
}

impl<'a> PathSegment<'a> {
    pub fn storage_name(&self) -> &str {
        match self {
            PathSegment::Field(field) => field.storage_name(),
            PathSegment::Dynamic(name) => name,
        }
    }

    pub fn field(&self) -> Option<&'a Field> {
        match self {
            PathSegment::Field(field) => Some(field),
            PathSegment::Dynamic(_) => None,
        }
    }
}

/// A schema-bearing type whose records map one-to-one to documents in a collection.
#[derive(Debug)]
pub struct DocumentType {
    name: String,
    collection: String,
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
    by_storage_name: HashMap<String, usize>,
    id_field: Field,
    strict: bool,
}

impl DocumentType {
    /// Starts declaring a document type with the given name.
    pub fn builder(name: impl Into<String>) -> DocumentTypeBuilder {
        DocumentTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection records of this type are stored in.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Declared fields in declaration order. The implicit `_id` field is not included.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    pub fn field_by_storage_name(&self, storage_name: &str) -> Option<&Field> {
        self.by_storage_name
            .get(storage_name)
            .map(|&index| &self.fields[index])
    }

    /// The implicit object-id field every document type carries under `_id`.
    pub fn id_field(&self) -> &Field {
        &self.id_field
    }

    /// Whether undeclared top-level names are rejected instead of passed through.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.is_unique())
    }

    /// Resolves a dotted logical path, one segment per path element.
    ///
    /// Segments following an embedded document field, or a list of embedded documents, are
    /// resolved against the embedded type. Once a segment is dynamic every following segment is
    /// dynamic too.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnresolvableFieldPath`] when the path has an empty segment, or
    /// when a segment is not declared on a strict type.
    pub fn get_fields(&self, path: &str) -> MapperResult<Vec<PathSegment<'_>>> {
        let mut segments = Vec::new();
        let mut current = Some(self);

        for name in path.split('.') {
            if name.is_empty() {
                return Err(MapperError::UnresolvableFieldPath(path.to_string()));
            }

            let Some(document_type) = current else {
                segments.push(PathSegment::Dynamic(name.to_string()));
                continue;
            };

            let field = if name == Record::ID {
                Some(&document_type.id_field)
            } else {
                document_type.field(name)
            };

            match field {
                Some(field) => {
                    current = field.kind().embedded_type().map(Arc::as_ref);
                    segments.push(PathSegment::Field(field));
                }
                None if document_type.strict => {
                    return Err(MapperError::UnresolvableFieldPath(path.to_string()));
                }
                None => {
                    current = None;
                    segments.push(PathSegment::Dynamic(name.to_string()));
                }
            }
        }

        Ok(segments)
    }

    /// The dot-joined storage path for a logical path.
    pub fn storage_path(&self, path: &str) -> MapperResult<String> {
        Ok(join_storage_path(&self.get_fields(path)?))
    }

    /// Fills in defaults and automatic values before a save.
    ///
    /// Empty fields with a default receive it, automatic timestamps are stamped, embedded
    /// records are prepared in turn, and finally every `on_save` hook computes its field.
    pub fn prepare(&self, record: &mut Record, creating: bool) {
        for field in &self.fields {
            let empty = record
                .get(field.name())
                .is_none_or(|value| field.is_empty(value));

            if empty {
                if let Some(default) = field.default_value() {
                    record.set(field.name(), default);
                }
            }

            if let FieldKind::DateTime(kind) = field.kind() {
                if let Some(now) = kind.auto_value(creating) {
                    record.set(field.name(), now);
                }
                if let Some(value) = record.get_mut(field.name()) {
                    DateTimeField::truncate(value);
                }
            }

            if let Some(embedded) = field.kind().embedded_type() {
                match record.get_mut(field.name()) {
                    Some(Value::Document(inner)) => embedded.prepare(inner, creating),
                    Some(Value::List(items)) => {
                        for item in items {
                            if let Value::Document(inner) = item {
                                embedded.prepare(inner, creating);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        for field in &self.fields {
            if let Some(hook) = field.on_save_hook() {
                let value = hook(record, creating);
                record.set(field.name(), value);
            }
        }
    }

    /// Checks required fields, then every field's own validation.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::InvalidDocument`] describing the first failing field.
    pub fn validate(&self, record: &Record) -> MapperResult<()> {
        let value_of = |field: &Field| record.get(field.name()).unwrap_or(&Value::Null);

        if let Some(field) = self
            .fields
            .iter()
            .find(|field| field.is_required() && value_of(field).is_null())
        {
            return Err(MapperError::InvalidDocument(format!("Field '{}' is required.", field.name())));
        }

        match self.fields.iter().find(|field| !field.validate(value_of(field))) {
            Some(field) => Err(MapperError::InvalidDocument(format!("Field '{}' must be valid.", field.name()))),
            None => Ok(()),
        }
    }

    /// Converts a record into its storage document.
    ///
    /// Declared fields are renamed to their storage names and coerced by their kinds. Null values
    /// are omitted. Undeclared names are kept as-is on dynamic types and dropped on strict ones.
    pub fn to_storage(&self, record: &Record) -> MapperResult<Document> {
        let mut document = Document::new();

        if let Some(id) = record.get(Record::ID).filter(|id| !id.is_null()) {
            document.insert(Record::ID, self.id_field.to_storage(id)?);
        }

        for field in &self.fields {
            match record.get(field.name()) {
                Some(value) if !value.is_null() => {
                    document.insert(field.storage_name(), field.to_storage(value)?);
                }
                _ => {}
            }
        }

        if !self.strict {
            for (name, value) in record.iter() {
                if name != Record::ID && !value.is_null() && !self.by_name.contains_key(name) {
                    document.insert(name, value.to_bson());
                }
            }
        }

        Ok(document)
    }

    /// Converts a storage document back into a record. Unknown storage names come back as
    /// dynamic values under the same name.
    pub fn from_storage(&self, document: Document) -> MapperResult<Record> {
        let mut record = Record::new();

        for (key, value) in document {
            if key == Record::ID {
                record.set(key, self.id_field.from_storage(value)?);
            } else if let Some(field) = self.field_by_storage_name(&key) {
                record.set(field.name(), field.from_storage(value)?);
            } else {
                record.set(key, Value::from_bson(value));
            }
        }

        Ok(record)
    }
}

pub(crate) fn join_storage_path(segments: &[PathSegment<'_>]) -> String {
    segments
        .iter()
        .map(PathSegment::storage_name)
        .collect::<Vec<_>>()
        .join(".")
}

/// Builder for [`DocumentType`].
#[derive(Debug)]
pub struct DocumentTypeBuilder {
    name: String,
    collection: Option<String>,
    fields: Vec<Field>,
    strict: bool,
}

impl DocumentTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            fields: Vec::new(),
            strict: false,
        }
    }

    /// Sets the collection name. Defaults to the type name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Declares a field. A field with the same logical name declared earlier is replaced.
    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name() == field.name()) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Inherits every field declared on `parent`. Fields declared afterwards override them.
    pub fn extend(self, parent: &DocumentType) -> Self {
        let strict = self.strict || parent.strict;
        let mut builder = parent
            .fields
            .iter()
            .cloned()
            .fold(self, DocumentTypeBuilder::field);

        builder.strict = strict;
        builder
    }

    /// Rejects undeclared top-level names in filters and drops them when storing.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Builds the document type.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::DuplicateStorageName`] when two fields share a storage name, or
    /// when a field claims the reserved `_id` name.
    pub fn build(self) -> MapperResult<Arc<DocumentType>> {
        let mut seen = HashSet::from([Record::ID.to_string()]);
        let mut by_name = HashMap::new();
        let mut by_storage_name = HashMap::new();

        for (index, field) in self.fields.iter().enumerate() {
            if !seen.insert(field.storage_name().to_string()) {
                return Err(MapperError::DuplicateStorageName(field.storage_name().to_string()));
            }

            by_name.insert(field.name().to_string(), index);
            by_storage_name.insert(field.storage_name().to_string(), index);
        }

        Ok(Arc::new(DocumentType {
            collection: self.collection.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            fields: self.fields,
            by_name,
            by_storage_name,
            id_field: Field::new(Record::ID, ObjectIdField::new()),
            strict: self.strict,
        }))
    }
}

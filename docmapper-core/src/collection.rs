//! Typed access to the records of one document type.
//!
//! A [`Collection`] ties a [`DocumentType`] to a backend. It prepares, validates and converts
//! records on the way in, enforces unique fields, and turns storage documents back into records
//! on the way out. Reads, updates and deletes are driven by [`QuerySet`]s obtained from
//! [`Collection::objects`].
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! # async fn example(store: &DocumentStore<impl StoreBackend>, users: &Arc<DocumentType>) -> MapperResult<()> {
//! let users = store.collection(users);
//!
//! let mut alice = Record::new().with("name", "Alice").with("age", 30);
//! users.save(&mut alice).await?;
//!
//! let adults = users.find_all(&users.objects().filter(filters! { "age__gte" => 18 })?).await?;
//! # Ok(()) }
//! ```

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    error::{CoercionError, MapperError, MapperResult},
    query::{FindQuery, QuerySet},
    schema::{DocumentType, join_storage_path},
    value::{Record, Value},
};

/// The records of one document type in a backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    document_type: Arc<DocumentType>,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    /// Creates a new collection reference (internal use).
    pub(crate) fn new(document_type: Arc<DocumentType>, backend: &'a B) -> Self {
        Self { document_type, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.document_type.collection()
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }

    /// Starts a query over this collection's document type.
    pub fn objects(&self) -> QuerySet {
        QuerySet::new(self.document_type.clone())
    }

    /// Saves a record, inserting it when it has no `_id` yet and replacing it otherwise.
    ///
    /// The record is prepared (defaults, automatic timestamps, `on_save` hooks), validated and
    /// checked against unique fields before it is converted and written. On insert the new id
    /// is stored in the record.
    ///
    /// # Errors
    ///
    /// - [`MapperError::InvalidDocument`] if validation fails
    /// - [`MapperError::UniqueKeyViolation`] if a unique field's value is already taken
    /// - [`MapperError::Coercion`] if a value cannot be converted to storage form
    pub async fn save(&self, record: &mut Record) -> MapperResult<ObjectId> {
        let existing = record.id();
        let creating = existing.is_none();

        self.document_type.prepare(record, creating);
        self.document_type.validate(record)?;
        self.check_unique(record, existing).await?;

        let mut document = self.document_type.to_storage(record)?;

        let id = match existing {
            Some(id) => {
                self.backend
                    .replace_document(id, document, self.name())
                    .await?;
                id
            }
            None => {
                let id = ObjectId::new();
                document.insert(Record::ID, id);
                self.backend
                    .insert_documents(vec![document], self.name())
                    .await?;
                record.set(Record::ID, id);
                id
            }
        };

        debug!("Collection({}).save: {} (creating: {})", self.name(), id, creating);

        Ok(id)
    }

    /// Saves a new record and returns it as stored.
    pub async fn create(&self, mut record: Record) -> MapperResult<Record> {
        self.save(&mut record).await?;

        Ok(record)
    }

    /// Inserts several new records in one backend call and returns them with their ids set.
    ///
    /// Every record is prepared and validated before anything is written.
    ///
    /// # Errors
    ///
    /// - [`MapperError::InvalidDocument`] naming the position of the first record that fails
    ///   validation or conversion
    /// - [`MapperError::UniqueKeyViolation`] if a unique field's value is already taken
    pub async fn bulk_insert(&self, mut records: Vec<Record>) -> MapperResult<Vec<Record>> {
        let mut documents = Vec::with_capacity(records.len());

        for (index, record) in records.iter_mut().enumerate() {
            let creating = record.id().is_none();
            self.document_type.prepare(record, creating);

            let mut document = self
                .document_type
                .validate(record)
                .and_then(|_| self.document_type.to_storage(record))
                .map_err(|err| {
                    MapperError::InvalidDocument(format!(
                        "Validation for document {index} in the documents you are saving failed with: {err}"
                    ))
                })?;

            self.check_unique(record, record.id()).await?;

            if creating {
                let id = ObjectId::new();
                document.insert(Record::ID, id);
                record.set(Record::ID, id);
            }
            documents.push(document);
        }

        debug!("Collection({}).bulk_insert: {}", self.name(), documents.len());

        self.backend
            .insert_documents(documents, self.name())
            .await?;

        Ok(records)
    }

    /// Retrieves a record by its id, given as an [`ObjectId`] or its hex text.
    ///
    /// # Errors
    ///
    /// - [`MapperError::DocumentNotFound`] if no record has the id
    /// - [`MapperError::Coercion`] if the id is not an object id
    pub async fn get(&self, id: impl Into<Value>) -> MapperResult<Record> {
        let id = match id.into() {
            Value::ObjectId(id) | Value::Reference(id) => id,
            Value::String(text) => ObjectId::parse_str(text.trim()).map_err(|_| {
                MapperError::coercion(Record::ID, CoercionError::expected("an object id", &text))
            })?,
            other => {
                return Err(MapperError::coercion(
                    Record::ID,
                    CoercionError::expected("an object id", other),
                ));
            }
        };

        let query = FindQuery::builder()
            .filter(doc! { "_id": id })
            .limit(1)
            .build();

        match self.backend.find_documents(&query, self.name()).await?.pop() {
            Some(document) => self.document_type.from_storage(document),
            None => Err(MapperError::DocumentNotFound(id.to_hex(), self.name().to_string())),
        }
    }

    /// Returns every record matched by the query set.
    pub async fn find_all(&self, query: &QuerySet) -> MapperResult<Vec<Record>> {
        self.backend
            .find_documents(&query.compile()?, self.name())
            .await?
            .into_iter()
            .map(|document| self.document_type.from_storage(document))
            .collect()
    }

    /// Returns the first record matched by the query set, if any.
    pub async fn find_one(&self, query: &QuerySet) -> MapperResult<Option<Record>> {
        let query = query.clone().limit(1);

        Ok(self.find_all(&query).await?.pop())
    }

    /// Counts the records matched by the query set. Paging is ignored.
    pub async fn count(&self, query: &QuerySet) -> MapperResult<u64> {
        self.backend
            .count_documents(query.filter_query()?.as_document(), self.name())
            .await
    }

    /// Sets fields on every record matched by the query set.
    ///
    /// Keys of `values` are logical field paths (`__` or `.` separated). Null values unset the
    /// field.
    ///
    /// # Returns
    ///
    /// The number of records matched.
    pub async fn update(&self, query: &QuerySet, values: Record) -> MapperResult<u64> {
        let mut set = Document::new();
        let mut unset = Document::new();

        for (name, value) in values.iter() {
            let segments = self.document_type.get_fields(&name.replace("__", "."))?;
            let path = join_storage_path(&segments);

            if value.is_null() {
                unset.insert(path, Bson::String(String::new()));
                continue;
            }

            let stored = match segments.last().and_then(|segment| segment.field()) {
                Some(field) => field.to_storage(value)?,
                None => value.to_bson(),
            };
            set.insert(path, stored);
        }

        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }

        let filter = query.filter_query()?.into_document();
        debug!("Collection({}).update: {} with {}", self.name(), filter, update);

        self.backend
            .update_documents(&filter, &update, self.name())
            .await
    }

    /// Deletes every record matched by the query set and returns how many were removed.
    pub async fn delete(&self, query: &QuerySet) -> MapperResult<u64> {
        let filter = query.filter_query()?.into_document();
        let deleted = self
            .backend
            .delete_documents(&filter, self.name())
            .await?;

        debug!("Collection({}).delete: {} removed by {}", self.name(), deleted, filter);

        Ok(deleted)
    }

    /// Rejects the record when another record already holds one of its unique values.
    ///
    /// Sparse unique fields are exempt while their value is empty.
    async fn check_unique(&self, record: &Record, id: Option<ObjectId>) -> MapperResult<()> {
        for field in self.document_type.unique_fields() {
            let value = record.get(field.name()).unwrap_or(&Value::Null);

            if field.is_sparse() && field.is_empty(value) {
                continue;
            }

            let mut filter = Document::new();
            filter.insert(field.storage_name(), field.to_storage(value)?);
            if let Some(id) = id {
                filter.insert(Record::ID, doc! { "$ne": id });
            }

            debug!("Collection({}).check_unique: {}", self.name(), filter);

            if self.backend.count_documents(&filter, self.name()).await? > 0 {
                return Err(MapperError::UniqueKeyViolation {
                    field: field.storage_name().to_string(),
                    collection: self.name().to_string(),
                });
            }
        }

        Ok(())
    }
}

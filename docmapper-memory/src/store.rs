//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that keeps documents as BSON in
//! insertion order, per collection, behind an async-safe read-write lock.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::trace;

use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{MapperError, MapperResult},
    query::FindQuery,
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator},
    path::{get_path, lookup, remove_path, set_path},
};

type StoreMap = HashMap<String, Vec<Document>>;

const ID: &str = "_id";

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait on top of the same filter documents a
/// document database would receive, evaluating them with an in-process matcher.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing). It is meant for tests and
/// small datasets.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::{backend::StoreBackend, query::FindQuery};
/// use bson::{doc, oid::ObjectId};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     store.insert_documents(vec![doc! { "_id": ObjectId::new(), "n": "Alice", "age": 30 }], "users").await?;
///
///     let docs = store.find_documents(&FindQuery::new(doc! { "age": { "$gte": 18 } }), "users").await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmapper_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> MapperResult<()> {
        let mut store = self.store.write().await;
        let existing = store
            .entry(collection.to_string())
            .or_default();

        let mut batch: Vec<&Bson> = Vec::with_capacity(documents.len());

        for document in &documents {
            let Some(id) = document.get(ID) else {
                continue;
            };

            let duplicate = batch.contains(&id) || existing.iter().any(|other| other.get(ID) == Some(id));
            batch.push(id);

            if duplicate {
                return Err(MapperError::UniqueKeyViolation {
                    field: ID.to_string(),
                    collection: collection.to_string(),
                });
            }
        }

        trace!("InMemoryStore({}).insert_documents: {}", collection, documents.len());

        existing.extend(documents);

        Ok(())
    }

    async fn find_documents(&self, query: &FindQuery, collection: &str) -> MapperResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => documents,
            None => return Ok(vec![]),
        };

        let mut matched = DocumentEvaluator::filter_documents(documents, &query.filter)?;

        trace!(
            "InMemoryStore({}).find_documents: scanned {}, matched {}",
            collection,
            documents.len(),
            matched.len()
        );

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| compare_by(a, b, sort));
        }

        Ok(
            matched
                .into_iter()
                .skip(query.skip.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .map(|document| match &query.projection {
                    Some(projection) => project(document, projection),
                    None => document.clone(),
                })
                .collect()
        )
    }

    async fn count_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => documents,
            None => return Ok(0),
        };

        let count = DocumentEvaluator::filter_documents(documents, filter)?.len();

        trace!("InMemoryStore({}).count_documents: {}", collection, count);

        Ok(count as u64)
    }

    async fn update_documents(&self, filter: &Document, update: &Document, collection: &str) -> MapperResult<u64> {
        for (operator, _) in update {
            if operator != "$set" && operator != "$unset" {
                return Err(MapperError::Backend(format!("Unsupported update operator: {operator}")));
            }
        }

        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(documents) => documents,
            None => return Ok(0),
        };

        let matched = documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).evaluate(filter))
            .collect::<MapperResult<Vec<_>>>()?;

        let mut updated = 0;

        for (document, _) in documents.iter_mut().zip(matched).filter(|(_, matched)| *matched) {

            if let Ok(set) = update.get_document("$set") {
                for (path, value) in set {
                    set_path(document, path, value.clone());
                }
            }

            if let Ok(unset) = update.get_document("$unset") {
                for (path, _) in unset {
                    remove_path(document, path);
                }
            }

            updated += 1;
        }

        trace!("InMemoryStore({}).update_documents: {}", collection, updated);

        Ok(updated)
    }

    async fn replace_document(&self, id: ObjectId, mut document: Document, collection: &str) -> MapperResult<()> {
        let mut store = self.store.write().await;
        let target = Bson::ObjectId(id);

        let slot = store
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|document| document.get(ID) == Some(&target)))
            .ok_or_else(|| MapperError::DocumentNotFound(id.to_hex(), collection.to_string()))?;

        document.insert(ID, target);
        *slot = document;

        Ok(())
    }

    async fn delete_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(documents) => documents,
            None => return Ok(0),
        };

        let doomed = documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).evaluate(filter))
            .collect::<MapperResult<Vec<_>>>()?;

        let before = documents.len();
        let mut doomed = doomed.into_iter();
        documents.retain(|_| !doomed.next().unwrap_or(false));

        let deleted = (before - documents.len()) as u64;

        trace!("InMemoryStore({}).delete_documents: {}", collection, deleted);

        Ok(deleted)
    }
}

/// Orders two documents by the sort keys in priority order.
fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, direction) in sort {
        let left = lookup(a, path)
            .first()
            .map(|value| Comparable::from(*value))
            .unwrap_or(Comparable::Null);
        let right = lookup(b, path)
            .first()
            .map(|value| Comparable::from(*value))
            .unwrap_or(Comparable::Null);

        let ordering = match direction.as_i32().or_else(|| direction.as_i64().map(|d| d as i32)) {
            Some(d) if d < 0 => right.sort_order(&left),
            _ => left.sort_order(&right),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn included(flag: &Bson) -> bool {
    match flag {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        _ => true,
    }
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless explicitly excluded.
fn project(document: &Document, projection: &Document) -> Document {
    let inclusion = projection
        .iter()
        .any(|(path, flag)| path != ID && included(flag));

    if !inclusion {
        let mut projected = document.clone();
        for (path, _) in projection {
            remove_path(&mut projected, path);
        }
        return projected;
    }

    let mut projected = Document::new();

    if projection.get(ID).is_none_or(included) {
        if let Some(id) = document.get(ID) {
            projected.insert(ID, id.clone());
        }
    }

    for (path, flag) in projection {
        if path == ID || !included(flag) {
            continue;
        }

        if let Some(value) = get_path(document, path) {
            set_path(&mut projected, path, value.clone());
        }
    }

    projected
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> MapperResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use docmapper_core::query::SortDirection;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::builder().build().await.unwrap();

        store
            .insert_documents(
                vec![
                    doc! { "_id": 1, "n": "Carol", "age": 12, "address": { "c": "Oslo" } },
                    doc! { "_id": 2, "n": "Alice", "age": 7, "address": { "c": "Berlin" } },
                    doc! { "_id": 3, "n": "Bob", "age": 10 },
                ],
                "users",
            )
            .await
            .unwrap();

        store
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|document| document.get_str("n").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn find_with_filter_sort_and_paging() {
        let store = seeded().await;

        let query = FindQuery::builder()
            .filter(doc! { "age": { "$gt": 5 } })
            .sort("age", SortDirection::Desc)
            .skip(1)
            .limit(1)
            .build();

        let found = store.find_documents(&query, "users").await.unwrap();

        assert_eq!(names(&found), vec!["Bob"]);
    }

    #[tokio::test]
    async fn missing_sort_keys_order_first() {
        let store = seeded().await;

        let query = FindQuery::builder()
            .sort("address.c", SortDirection::Asc)
            .build();

        let found = store.find_documents(&query, "users").await.unwrap();

        assert_eq!(names(&found), vec!["Bob", "Alice", "Carol"]);
    }

    #[tokio::test]
    async fn projections_include_or_exclude() {
        let store = seeded().await;

        let included = FindQuery::builder()
            .filter(doc! { "_id": 1 })
            .projection(doc! { "address.c": 1 })
            .build();
        let excluded = FindQuery::builder()
            .filter(doc! { "_id": 1 })
            .projection(doc! { "address": 0, "age": 0 })
            .build();

        assert_eq!(
            store.find_documents(&included, "users").await.unwrap(),
            vec![doc! { "_id": 1, "address": { "c": "Oslo" } }]
        );
        assert_eq!(
            store.find_documents(&excluded, "users").await.unwrap(),
            vec![doc! { "_id": 1, "n": "Carol" }]
        );
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = seeded().await;

        let result = store.insert_documents(vec![doc! { "_id": 1 }], "users").await;

        assert!(matches!(result, Err(MapperError::UniqueKeyViolation { field, .. }) if field == "_id"));
    }

    #[tokio::test]
    async fn duplicate_ids_within_a_batch_are_rejected() {
        let store = InMemoryStore::new();

        let result = store
            .insert_documents(vec![doc! { "_id": 1, "n": "Alice" }, doc! { "_id": 1, "n": "Bob" }], "users")
            .await;

        assert!(matches!(result, Err(MapperError::UniqueKeyViolation { field, .. }) if field == "_id"));
        assert_eq!(store.count_documents(&doc! {}, "users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_updates_leave_documents_untouched() {
        let store = InMemoryStore::new();

        store
            .insert_documents(vec![doc! { "_id": 1, "a": 1 }, doc! { "_id": 2, "a": 2, "b": "x" }], "items")
            .await
            .unwrap();

        let result = store
            .update_documents(
                &doc! { "$or": [{ "a": 1 }, { "b": { "$regex": "(" } }] },
                &doc! { "$set": { "touched": true } },
                "items",
            )
            .await;

        assert!(matches!(result, Err(MapperError::Backend(_))));
        assert_eq!(store.count_documents(&doc! { "touched": true }, "items").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_sets_and_unsets_paths() {
        let store = seeded().await;

        let updated = store
            .update_documents(
                &doc! { "age": { "$lt": 11 } },
                &doc! { "$set": { "address.zip": "0000" }, "$unset": { "age": "" } },
                "users",
            )
            .await
            .unwrap();

        assert_eq!(updated, 2);
        assert_eq!(store.count_documents(&doc! { "address.zip": "0000" }, "users").await.unwrap(), 2);
        assert_eq!(store.count_documents(&doc! { "age": { "$exists": true } }, "users").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn updates_require_update_operators() {
        let store = seeded().await;

        let result = store
            .update_documents(&doc! {}, &doc! { "n": "Eve" }, "users")
            .await;

        assert!(matches!(result, Err(MapperError::Backend(_))));
    }

    #[tokio::test]
    async fn replace_and_delete() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();

        store
            .insert_documents(vec![doc! { "_id": id, "n": "Alice" }], "users")
            .await
            .unwrap();
        store
            .replace_document(id, doc! { "n": "Alicia" }, "users")
            .await
            .unwrap();

        let found = store.find_documents(&FindQuery::default(), "users").await.unwrap();
        assert_eq!(found, vec![doc! { "_id": id, "n": "Alicia" }]);

        let missing = store
            .replace_document(ObjectId::new(), doc! {}, "users")
            .await;
        assert!(matches!(missing, Err(MapperError::DocumentNotFound(_, _))));

        assert_eq!(store.delete_documents(&doc! { "n": "Alicia" }, "users").await.unwrap(), 1);
        assert_eq!(store.count_documents(&doc! {}, "users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_collections_are_empty() {
        let store = InMemoryStore::new();

        assert!(store.find_documents(&FindQuery::default(), "nope").await.unwrap().is_empty());
        assert_eq!(store.delete_documents(&doc! {}, "nope").await.unwrap(), 0);
    }
}

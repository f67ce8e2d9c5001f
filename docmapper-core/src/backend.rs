//! Storage backend abstraction for the mapper.
//!
//! This module defines the seam between the mapper and whatever executes store queries. The
//! mapper hands a backend fully compiled documents and filters in store syntax; a backend never
//! sees document types, logical field names or filter keys.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmapper::backend::StoreBackend;
//! use docmapper::query::FindQuery;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_documents(vec![doc! { "_id": ObjectId::new(), "n": "Alice" }], "users").await?;
//! let found = backend.find_documents(&FindQuery::new(doc! { "n": "Alice" }), "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::Debug;

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};

use crate::{error::MapperResult, query::FindQuery};

/// Abstract interface for document storage backends.
///
/// Filters, projections and sort documents use the store's query syntax as produced by the
/// query compiler: dotted storage paths mapped to literals or `$`-operator expressions, combined
/// with `$and`, `$or` and `$nor`.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The exact concurrency model is implementation-specific but should be
/// documented by the implementer.
///
/// # Error Handling
///
/// Operations return [`MapperResult<T>`](crate::error::MapperResult). Store failures are
/// reported as [`MapperError::Backend`](crate::error::MapperError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// # Arguments
    ///
    /// * `documents` - The storage documents to insert, each carrying its `_id`
    /// * `collection` - The name of the collection to insert into. Created automatically if it doesn't exist.
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> MapperResult<()>;

    /// Returns the documents matching a compiled query.
    ///
    /// # Arguments
    ///
    /// * `query` - The [`FindQuery`] specifying filter, projection, sort, skip and limit
    /// * `collection` - The name of the collection to query
    async fn find_documents(&self, query: &FindQuery, collection: &str) -> MapperResult<Vec<Document>>;

    /// Counts the documents matching a filter.
    async fn count_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64>;

    /// Applies an update document to every document matching a filter.
    ///
    /// # Arguments
    ///
    /// * `filter` - Selects the documents to update
    /// * `update` - The update in store syntax, e.g. `{ "$set": { "n": "Bob" } }`
    /// * `collection` - The name of the collection containing the documents
    ///
    /// # Returns
    ///
    /// The number of documents that matched the filter.
    async fn update_documents(&self, filter: &Document, update: &Document, collection: &str) -> MapperResult<u64>;

    /// Replaces the document with the given id entirely.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::DocumentNotFound`](crate::error::MapperError::DocumentNotFound)
    /// when no document carries the id.
    async fn replace_document(&self, id: ObjectId, document: Document, collection: &str) -> MapperResult<()>;

    /// Deletes every document matching a filter and returns how many were removed.
    async fn delete_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with persistent storage or
    /// external connections should override this.
    async fn shutdown(self) -> MapperResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> MapperResult<()> {
        (*self)
            .insert_documents(documents, collection)
            .await
    }

    async fn find_documents(&self, query: &FindQuery, collection: &str) -> MapperResult<Vec<Document>> {
        (*self)
            .find_documents(query, collection)
            .await
    }

    async fn count_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64> {
        (*self)
            .count_documents(filter, collection)
            .await
    }

    async fn update_documents(&self, filter: &Document, update: &Document, collection: &str) -> MapperResult<u64> {
        (*self)
            .update_documents(filter, update, collection)
            .await
    }

    async fn replace_document(&self, id: ObjectId, document: Document, collection: &str) -> MapperResult<()> {
        (*self)
            .replace_document(id, document, collection)
            .await
    }

    async fn delete_documents(&self, filter: &Document, collection: &str) -> MapperResult<u64> {
        (*self)
            .delete_documents(filter, collection)
            .await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> MapperResult<Self::Backend>;
}

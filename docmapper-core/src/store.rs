//! Main document store interface for interacting with document backends.
//!
//! A [`DocumentStore`] owns a backend and hands out [`Collection`]s bound to document types.
//!
//! # Example
//!
//! ```ignore
//! use docmapper::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.collection(&user_type);
//! ```

use std::sync::Arc;

use crate::{backend::StoreBackend, collection::Collection, error::MapperResult, schema::DocumentType};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The backend queries are executed on.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets the collection records of the document type live in.
    ///
    /// The collection name is the document type's collection name.
    pub fn collection<'a>(&'a self, document_type: &Arc<DocumentType>) -> Collection<'a, B> {
        Collection::new(document_type.clone(), &self.backend)
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown operation fails.
    pub async fn shutdown(self) -> MapperResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

//! Main docmapper crate providing typed document mapping over BSON document stores.
//!
//! This crate is the primary entry point for users of the docmapper framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the bundled storage backend.
//!
//! # Features
//!
//! - **Declarative document types** - Fields with storage names, defaults, validation and hooks
//! - **Field-aware filters** - `path__operator` keys compiled into store queries with values coerced per field
//! - **Composable queries** - `Q` trees with `&`, `|` and `!`, ordering, paging and projections
//! - **Pluggable backends** - An async backend trait with an in-memory implementation
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> MapperResult<()> {
//!     let address = DocumentType::builder("Address")
//!         .field(Field::new("city", StringField::new()).db_field("c"))
//!         .build()?;
//!
//!     let user = DocumentType::builder("User")
//!         .collection("users")
//!         .field(Field::new("name", StringField::new().max_length(50)).required())
//!         .field(Field::new("age", IntField::new()))
//!         .field(Field::new("address", EmbeddedDocumentField::new(address)))
//!         .build()?;
//!
//!     // Create an in-memory store backend
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.collection(&user);
//!
//!     users
//!         .create(
//!             Record::new()
//!                 .with("name", "Alice")
//!                 .with("age", 30)
//!                 .with("address", Record::new().with("city", "Berlin")),
//!         )
//!         .await?;
//!
//!     // `address__city` is compiled to the storage path `address.c`
//!     let berliners = users
//!         .find_all(&users.objects().filter(filters! { "address__city" => "Berlin", "age__gte" => 18 })?)
//!         .await?;
//!
//!     println!("Queried users: {:?}", berliners);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Boolean Queries
//!
//! Filter sets combine into [`Q`](node::Q) trees. Negation is pushed down to the fields, so
//! `!Q` never needs a top-level `$not`:
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! let adults_or_staff = Q::from(filters! { "age__gte" => 18 }) | Q::from(filters! { "tags" => "staff" });
//! let query = users.objects().filter(adults_or_staff & !Q::from(filters! { "name__istartswith" => "b" }))?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing

pub mod prelude;

pub use docmapper_core::{
    backend, collection, error, field, filter, fragment, node, operator, projection, query, schema, store, transform,
    value,
};
pub use docmapper_core::filters;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmapper_memory::{InMemoryStore, InMemoryStoreBuilder};
}

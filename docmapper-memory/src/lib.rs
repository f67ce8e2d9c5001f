//! In-memory document storage backend for docmapper.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates the compiled filter documents the mapper produces, which makes it the natural
//! backend for tests and development.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filter evaluation** - Equality, comparisons, membership, existence, regex and logical operators over dotted paths
//! - **Result shaping** - Sorting, skip, limit and projections
//! - **Updates** - `$set` and `$unset` on dotted paths
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::prelude::*;
//! use docmapper::memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user = DocumentType::builder("User")
//!         .collection("users")
//!         .field(Field::new("name", StringField::new()).db_field("n"))
//!         .build()?;
//!
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.collection(&user);
//!
//!     users.create(Record::new().with("name", "Alice")).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod evaluator;
pub mod store;
mod path;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

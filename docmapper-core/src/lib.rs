//! A typed object-document mapping layer for BSON document stores.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Values and records** ([`value`]) - Dynamic field values and untyped records
//! - **Field types** ([`field`]) - Conversion and validation between values and storage form
//! - **Document types** ([`schema`]) - Named field sets with storage names and path resolution
//! - **Filters** ([`filter`], [`transform`], [`operator`]) - The `path__operator` filter language and its compiler
//! - **Query composition** ([`fragment`], [`node`], [`projection`], [`query`]) - Boolean trees, merged fragments and query sets
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Collections interface** ([`collection`]) - Save, find, update and delete typed records
//! - **Document store** ([`store`]) - Entry point that hands out collections
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! let user = DocumentType::builder("User")
//!     .collection("users")
//!     .field(Field::new("name", StringField::new()).db_field("n").required())
//!     .field(Field::new("age", IntField::new()))
//!     .build()?;
//!
//! let query = QuerySet::new(user).filter(filters! { "age__gte" => 18, "name__istartswith" => "a" })?;
//!
//! assert_eq!(query.compile()?.filter, doc! { "age": { "$gte": 18 }, "n": { "$regex": "^a", "$options": "i" } });
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod collection;
pub mod error;
pub mod field;
pub mod filter;
pub mod fragment;
pub mod node;
pub mod operator;
pub mod projection;
pub mod query;
pub mod schema;
pub mod store;
pub mod transform;
pub mod value;

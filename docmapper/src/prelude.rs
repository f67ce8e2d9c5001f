//! Convenient re-exports of commonly used types from docmapper.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```
//!
//! This provides access to:
//! - Values, records and field kinds
//! - Document types and their builders
//! - Filters, `Q` trees and query sets
//! - Store backends, collections and error types

pub use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{CoercionError, MapperError, MapperResult},
    field::{
        BinaryField, BooleanField, DateTimeField, DecimalField, DictField, EmailField, EmbeddedDocumentField, Field,
        FieldKind, FieldType, FloatField, IntField, JsonField, ListField, ObjectIdField, ReferenceField, StringField,
        UrlField, UuidField,
    },
    filter::{FilterArg, Filters},
    filters,
    fragment::QueryFragment,
    node::Q,
    query::{FindQuery, QuerySet, Sort, SortDirection},
    schema::DocumentType,
    store::DocumentStore,
    value::{Record, Value},
};

pub use bson::{doc, oid::ObjectId};

//! Error types and result types for mapping, query compilation and store operations.
//!
//! Every fallible operation in this crate returns [`MapperResult<T>`]. Field kinds report
//! conversion problems with the lighter [`CoercionError`], which callers wrap into
//! [`MapperError::Coercion`] together with the name of the field or filter key involved.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A value could not be converted to or from its storage form.
///
/// Returned by the [`FieldType`](crate::field::FieldType) implementations, which do not know
/// the name of the field they are attached to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CoercionError(pub String);

impl CoercionError {
    /// Builds an error describing the expected input and what was received instead.
    pub fn expected(expected: &str, found: impl std::fmt::Debug) -> Self {
        CoercionError(format!("expected {expected}, got {found:?}"))
    }
}

/// Represents all possible errors raised by the mapper, the query compiler and the stores.
#[derive(Error, Debug)]
pub enum MapperError {
    /// A value could not be converted between its native and storage forms.
    #[error("Cannot coerce value for '{field}': {source}")]
    Coercion {
        /// The field name, or the filter key when raised while compiling a query.
        field: String,
        #[source]
        source: CoercionError,
    },
    /// A field path could not be resolved against the document type.
    #[error("Invalid filter '{0}': field path cannot be resolved")]
    UnresolvableFieldPath(String),
    /// A filter key traverses a plain field without a known operator suffix.
    #[error(
        "Invalid filter '{0}': Invalid operator (if this is a sub-property, then it must be used in embedded document fields)."
    )]
    InvalidOperatorUsage(String),
    /// Two declared fields share the same storage name.
    #[error("Multiple db_fields defined for: {0}")]
    DuplicateStorageName(String),
    /// A document failed validation before being stored.
    #[error("{0}")]
    InvalidDocument(String),
    /// The `raw` filter did not carry a mapping.
    #[error("Invalid raw query: {0}")]
    InvalidRawQuery(String),
    /// An ordering was requested on a field the document type does not declare.
    #[error("Invalid order by field '{field}': Field not found in '{document_type}'.")]
    InvalidSortField {
        /// The requested sort key.
        field: String,
        /// The name of the document type being queried.
        document_type: String,
    },
    /// Saving would break a unique field constraint.
    #[error("Unique key violation on field '{field}' in collection '{collection}'")]
    UniqueKeyViolation {
        /// The storage name of the unique field.
        field: String,
        /// The collection the document was saved to.
        collection: String,
    },
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

impl MapperError {
    pub(crate) fn coercion(field: impl Into<String>, source: CoercionError) -> Self {
        MapperError::Coercion { field: field.into(), source }
    }
}

impl From<BsonError> for MapperError {
    fn from(err: BsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MapperError {
    fn from(err: SerdeJsonError) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

//! Fluent query construction over a document type.
//!
//! A [`QuerySet`] collects filters, ordering, paging and a projection for one document type
//! and compiles them into a [`FindQuery`], the ready-to-send form a
//! [`StoreBackend`](crate::backend::StoreBackend) executes.
//!
//! # Query Building
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! let query = QuerySet::new(user_type)
//!     .filter(filters! { "age__gte" => 18 })?
//!     .filter_not(filters! { "name__startswith" => "B" })?
//!     .order_by("age", SortDirection::Desc)?
//!     .skip(10)
//!     .limit(10)
//!     .only(&["name", "age"])
//!     .compile()?;
//! ```
//!
//! Filters are validated with [`validate_fields`](crate::transform::validate_fields) as soon as
//! they are added, so a bad key fails at the call that introduced it.

use std::sync::Arc;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{MapperError, MapperResult},
    fragment::QueryFragment,
    node::Q,
    projection::transform_field_selection,
    schema::{DocumentType, PathSegment, join_storage_path},
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    fn as_bson(self) -> Bson {
        match self {
            SortDirection::Asc => Bson::Int32(1),
            SortDirection::Desc => Bson::Int32(-1),
        }
    }
}

/// A sort key for query results.
///
/// Serializes as `{"field": "...", "direction": "asc" | "desc"}`, so sort requests can be read
/// from JSON and applied with [`QuerySet::order_by`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// The storage path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A compiled find request in store syntax.
///
/// Use [`FindQueryBuilder`] for ergonomic construction when no document type is involved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// The filter document. Empty matches every document.
    pub filter: Document,
    /// An inclusion or exclusion projection over storage paths.
    pub projection: Option<Document>,
    /// Sort keys in priority order, `1` ascending and `-1` descending.
    pub sort: Option<Document>,
    /// Number of documents to skip.
    pub skip: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Creates a query matching the given filter with no other restriction.
    pub fn new(filter: impl Into<Document>) -> Self {
        FindQuery { filter: filter.into(), ..Default::default() }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> FindQueryBuilder {
        FindQueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindQueryBuilder {
    query: FindQuery,
}

impl FindQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter document.
    pub fn filter(mut self, filter: impl Into<Document>) -> Self {
        self.query.filter = filter.into();
        self
    }

    /// Sets the projection document.
    pub fn projection(mut self, projection: Document) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Appends a sort key. Earlier keys take priority.
    ///
    /// # Arguments
    ///
    /// * `field` - The storage path to sort by
    /// * `direction` - The sort direction (ascending or descending)
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query
            .sort
            .get_or_insert_with(Document::new)
            .insert(field.into(), direction.as_bson());
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> FindQuery {
        self.query
    }
}

/// A deferred, validated query over one document type.
///
/// Nothing is lowered until [`QuerySet::compile`] is called.
#[derive(Debug, Clone)]
pub struct QuerySet {
    document_type: Arc<DocumentType>,
    filter: Option<Q>,
    sort: Vec<Sort>,
    skip: Option<usize>,
    limit: Option<usize>,
    projection: Vec<(String, bool)>,
}

impl QuerySet {
    /// Creates a query set matching every record of the document type.
    pub fn new(document_type: Arc<DocumentType>) -> Self {
        Self {
            document_type,
            filter: None,
            sort: Vec::new(),
            skip: None,
            limit: None,
            projection: Vec::new(),
        }
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }

    /// Narrows the query to records matching `q`, in addition to any earlier filter.
    ///
    /// # Errors
    ///
    /// Returns the [`validate_fields`](crate::transform::validate_fields) error of the first
    /// invalid key in `q`.
    pub fn filter(mut self, q: impl Into<Q>) -> MapperResult<Self> {
        let q = q.into();
        q.validate(&self.document_type)?;

        self.filter = Some(match self.filter.take() {
            Some(existing) => existing & q,
            None => q,
        });

        Ok(self)
    }

    /// Narrows the query to records that do not match `q`.
    pub fn filter_not(self, q: impl Into<Q>) -> MapperResult<Self> {
        let q: Q = q.into();
        self.filter(!q)
    }

    /// Appends a sort key. Nested fields may use `__` or `.` between segments.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::InvalidSortField`] unless the path ends on a declared field.
    pub fn order_by(mut self, field: &str, direction: SortDirection) -> MapperResult<Self> {
        let path = field.replace("__", ".");
        let invalid = || MapperError::InvalidSortField {
            field: field.to_string(),
            document_type: self.document_type.name().to_string(),
        };

        let segments = self.document_type.get_fields(&path).map_err(|_| invalid())?;

        if !matches!(segments.last(), Some(PathSegment::Field(_))) {
            return Err(invalid());
        }

        self.sort.push(Sort { field: join_storage_path(&segments), direction });

        Ok(self)
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts the returned fields. The identifier is always returned by the store.
    pub fn only<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.projection = fields.iter().map(|field| (field.as_ref().to_string(), true)).collect();
        self
    }

    /// Leaves the given fields out of the returned records. Replaces any earlier
    /// [`only`](Self::only).
    pub fn exclude<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.projection = fields.iter().map(|field| (field.as_ref().to_string(), false)).collect();
        self
    }

    /// Lowers the filter alone. An unfiltered query set yields an empty fragment.
    pub fn filter_query(&self) -> MapperResult<QueryFragment> {
        match &self.filter {
            Some(q) => q.to_query(&self.document_type),
            None => Ok(QueryFragment::new()),
        }
    }

    /// Compiles the query set into its store form.
    pub fn compile(&self) -> MapperResult<FindQuery> {
        let filter = self.filter_query()?;

        debug!("QuerySet({}).compile: {}", self.document_type.collection(), filter);

        let sort = (!self.sort.is_empty()).then(|| {
            self.sort
                .iter()
                .map(|sort| (sort.field.clone(), sort.direction.as_bson()))
                .collect::<Document>()
        });

        Ok(FindQuery {
            filter: filter.into_document(),
            projection: transform_field_selection(&self.document_type, &self.projection)?,
            sort,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

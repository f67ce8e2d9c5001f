//! Query fragments and their recursive merge.

use std::fmt;

use bson::{Bson, Document};

/// A partial store query: storage paths mapped to literals or operator expressions.
///
/// Fragments combine with [`QueryFragment::merge`], a recursive union. When both sides hold a
/// nested document under the same key the two are merged key by key. In every other case the
/// incoming value replaces the existing one.
#[derive(Clone, Default, PartialEq)]
pub struct QueryFragment {
    document: Document,
}

impl QueryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment holding a single entry.
    pub fn single(key: impl Into<String>, value: impl Into<Bson>) -> Self {
        let mut document = Document::new();
        document.insert(key, value);
        Self { document }
    }

    /// Merges `other` into this fragment. Entries of `other` win on conflict.
    pub fn merge(&mut self, other: QueryFragment) {
        merge_documents(&mut self.document, other.document);
    }

    /// Returns the union of both fragments.
    pub fn merged(mut self, other: QueryFragment) -> Self {
        self.merge(other);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.document.contains_key(key)
    }

    pub fn as_document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

fn merge_documents(target: &mut Document, incoming: Document) {
    for (key, value) in incoming {
        match value {
            Bson::Document(nested) => match target.get_mut(&key) {
                Some(Bson::Document(existing)) => merge_documents(existing, nested),
                _ => {
                    target.insert(key, nested);
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

impl From<Document> for QueryFragment {
    fn from(document: Document) -> Self {
        Self { document }
    }
}

impl From<QueryFragment> for Document {
    fn from(fragment: QueryFragment) -> Self {
        fragment.document
    }
}

impl From<QueryFragment> for Bson {
    fn from(fragment: QueryFragment) -> Self {
        Bson::Document(fragment.document)
    }
}

impl PartialEq<Document> for QueryFragment {
    fn eq(&self, other: &Document) -> bool {
        &self.document == other
    }
}

impl fmt::Debug for QueryFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.document, f)
    }
}

impl fmt::Display for QueryFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.document, f)
    }
}

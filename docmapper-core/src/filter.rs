//! Keyword-style filter sets.
//!
//! A [`Filters`] set maps filter keys such as `age__gt` or `address__city` to operands. Keys are
//! kept sorted, so compiling a set is deterministic no matter in which order it was built.

use std::collections::{BTreeMap, btree_map};

use bson::Document;

use crate::value::Value;

/// The reserved key whose mapping is merged into the query untouched.
pub const RAW_KEY: &str = "raw";

/// The operand of one filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    /// A native operand, coerced through the filtered field.
    Value(Value),
    /// A ready-made store expression, passed through as-is.
    Raw(Document),
}

impl From<Value> for FilterArg {
    fn from(value: Value) -> Self {
        FilterArg::Value(value)
    }
}

impl From<Document> for FilterArg {
    fn from(document: Document) -> Self {
        FilterArg::Raw(document)
    }
}

/// A set of filter expressions, sorted by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: BTreeMap<String, FilterArg>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter. A filter with the same key is replaced.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, FilterArg::Value(value.into()));
        self
    }

    /// Adds a pass-through store expression under the `raw` key.
    pub fn raw(mut self, expression: Document) -> Self {
        self.insert(RAW_KEY, FilterArg::Raw(expression));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, arg: impl Into<FilterArg>) {
        self.entries.insert(key.into(), arg.into());
    }

    pub fn get(&self, key: &str) -> Option<&FilterArg> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FilterArg> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = (&'a String, &'a FilterArg);
    type IntoIter = btree_map::Iter<'a, String, FilterArg>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filters::new(), |filters, (key, value)| filters.with(key, value))
    }
}

/// Builds a [`Filters`] set from `key => value` pairs.
///
/// ```ignore
/// let filters = filters! { "age__gt" => 8, "age__lt" => 11 };
/// ```
#[macro_export]
macro_rules! filters {
    () => {
        $crate::filter::Filters::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::filter::Filters::new()$(.with($key, $value))+
    };
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn keys_are_iterated_in_sorted_order() {
        let filters = filters! { "b__lt" => 3, "a" => 1, "b__gt" => 2 };

        assert_eq!(filters.keys().collect::<Vec<_>>(), vec!["a", "b__gt", "b__lt"]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward: Filters = vec![("x", 1), ("y", 2)].into_iter().collect();
        let backward: Filters = vec![("y", 2), ("x", 1)].into_iter().collect();

        assert_eq!(forward, backward);
    }

    #[test]
    fn raw_expressions_are_kept_verbatim() {
        let filters = Filters::new().raw(doc! { "$where": "true" });

        assert_eq!(filters.get(RAW_KEY), Some(&FilterArg::Raw(doc! { "$where": "true" })));
        assert!(filters!().is_empty());
    }
}

//! Query expression evaluation for in-memory document filtering.
//!
//! This module matches BSON documents against compiled filter documents in store syntax:
//! dotted paths mapped to literals or `$`-operator expressions, combined with `$and`, `$or`
//! and `$nor`.

use std::{cmp::Ordering, collections::HashMap, iter};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::RegexBuilder;

use docmapper_core::error::{MapperError, MapperResult};

use crate::path::lookup;

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Values of different types never compare as equal,
/// and only order against each other through [`Comparable::sort_order`].
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// A value the matcher has no comparison for.
    Other,
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
            Comparable::Other => 9,
        }
    }

    /// Total order used for sorting: by type first, then by value.
    pub(crate) fn sort_order(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Other,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            (Comparable::Binary(a), Comparable::Binary(b)) => Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b))),
            _ => None,
        }
    }
}

/// Matches one document against filter documents.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Backend`] for operators the matcher does not support, malformed
    /// logical clauses and invalid regular expressions.
    pub fn evaluate(&self, filter: &Document) -> MapperResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for clause in clauses(key, condition)? {
                        if !self.evaluate(clause)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                "$or" => self.any(clauses(key, condition)?)?,
                "$nor" => !self.any(clauses(key, condition)?)?,
                operator if operator.starts_with('$') => return Err(unsupported(operator)),
                path => matches_condition(&lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, clauses: Vec<&Document>) -> MapperResult<bool> {
        for clause in clauses {
            if self.evaluate(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Keeps the documents matching `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> MapperResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }
}

fn clauses<'f>(key: &str, condition: &'f Bson) -> MapperResult<Vec<&'f Document>> {
    let malformed = || MapperError::Backend(format!("{key} requires an array of documents"));

    match condition {
        Bson::Array(items) => items
            .iter()
            .map(|item| item.as_document().ok_or_else(malformed))
            .collect(),
        _ => Err(malformed()),
    }
}

fn unsupported(operator: &str) -> MapperError {
    MapperError::Backend(format!("Unsupported query operator: {operator}"))
}

/// An operator expression is a document whose keys are `$` operators.
fn is_operator_expression(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn matches_condition(values: &[&Bson], condition: &Bson) -> MapperResult<bool> {
    match condition {
        Bson::Document(expression) if is_operator_expression(expression) => {
            for (operator, operand) in expression {
                if !apply(values, operator, operand, expression)? {
                    return Ok(false);
                }
            }

            Ok(true)
        }
        literal => Ok(equals(values, literal)),
    }
}

fn apply(values: &[&Bson], operator: &str, operand: &Bson, expression: &Document) -> MapperResult<bool> {
    Ok(match operator {
        "$eq" => equals(values, operand),
        "$ne" => !equals(values, operand),
        "$gt" => compare(values, operand, |ordering| ordering == Ordering::Greater),
        "$gte" => compare(values, operand, |ordering| ordering != Ordering::Less),
        "$lt" => compare(values, operand, |ordering| ordering == Ordering::Less),
        "$lte" => compare(values, operand, |ordering| ordering != Ordering::Greater),
        "$in" => operand_list(operator, operand)?
            .iter()
            .any(|item| equals(values, item)),
        "$nin" => !operand_list(operator, operand)?
            .iter()
            .any(|item| equals(values, item)),
        "$exists" => !values.is_empty() == truthy(operand),
        "$not" => match operand {
            Bson::Document(inner) if is_operator_expression(inner) => !matches_condition(values, operand)?,
            _ => return Err(MapperError::Backend("$not requires an operator expression".to_string())),
        },
        "$regex" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| MapperError::Backend("$regex requires a string pattern".to_string()))?;
            let options = expression.get_str("$options").unwrap_or_default();

            matches_pattern(values, pattern, options)?
        }
        "$options" => true,
        other => return Err(unsupported(other)),
    })
}

/// Every value a path condition is tested against: the resolved values and the elements of
/// resolved arrays.
fn candidates<'a>(values: &[&'a Bson]) -> impl Iterator<Item = &'a Bson> {
    values.iter().flat_map(|&value| {
        let elements: &'a [Bson] = match value {
            Bson::Array(items) => items,
            _ => &[],
        };

        iter::once(value).chain(elements)
    })
}

/// Equality with array membership. A null literal also matches a missing path.
fn equals(values: &[&Bson], literal: &Bson) -> bool {
    if matches!(literal, Bson::Null) && values.is_empty() {
        return true;
    }

    let expected = Comparable::from(literal);

    candidates(values).any(|value| Comparable::from(value) == expected)
}

fn compare(values: &[&Bson], operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(operand);

    candidates(values).any(|value| {
        Comparable::from(value)
            .partial_cmp(&bound)
            .is_some_and(accept)
    })
}

fn operand_list<'b>(operator: &str, operand: &'b Bson) -> MapperResult<&'b Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| MapperError::Backend(format!("{operator} requires an array")))
}

fn truthy(operand: &Bson) -> bool {
    match operand {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn matches_pattern(values: &[&Bson], pattern: &str, options: &str) -> MapperResult<bool> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|err| MapperError::Backend(format!("Invalid $regex '{pattern}': {err}")))?;

    Ok(candidates(values).any(|value| matches!(value, Bson::String(text) if regex.is_match(text))))
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn person() -> Document {
        doc! {
            "_id": 1,
            "n": "Alice",
            "age": 30,
            "score": 7.5,
            "tags": ["admin", "staff"],
            "address": { "c": "Berlin", "zip": "10115" },
            "orders": [{ "sku": "a-1", "qty": 2 }, { "sku": "b-2", "qty": 5 }],
            "nickname": null,
        }
    }

    fn matches(filter: Document) -> bool {
        DocumentEvaluator::new(&person()).evaluate(&filter).unwrap()
    }

    #[test]
    fn empty_filter_matches() {
        assert!(matches(doc! {}));
    }

    #[test]
    fn literal_equality() {
        assert!(matches(doc! { "n": "Alice" }));
        assert!(matches(doc! { "age": 30.0 }));
        assert!(!matches(doc! { "n": "Bob" }));
        assert!(!matches(doc! { "age": "30" }));
    }

    #[test]
    fn equality_reaches_into_arrays() {
        assert!(matches(doc! { "tags": "staff" }));
        assert!(matches(doc! { "tags": ["admin", "staff"] }));
        assert!(matches(doc! { "orders.sku": "b-2" }));
        assert!(!matches(doc! { "tags": "guest" }));
    }

    #[test]
    fn null_matches_missing_and_null() {
        assert!(matches(doc! { "nickname": null }));
        assert!(matches(doc! { "missing": null }));
        assert!(!matches(doc! { "n": null }));
        assert!(matches(doc! { "n": { "$ne": null } }));
    }

    #[test]
    fn comparisons() {
        assert!(matches(doc! { "age": { "$gt": 20, "$lte": 30 } }));
        assert!(!matches(doc! { "age": { "$lt": 30 } }));
        assert!(matches(doc! { "score": { "$gte": 7 } }));
        assert!(matches(doc! { "orders.qty": { "$gt": 4 } }));
        assert!(!matches(doc! { "n": { "$gt": 5 } }));
        assert!(!matches(doc! { "missing": { "$lt": 5 } }));
    }

    #[test]
    fn membership() {
        assert!(matches(doc! { "age": { "$in": [10, 30] } }));
        assert!(matches(doc! { "tags": { "$in": ["guest", "admin"] } }));
        assert!(matches(doc! { "age": { "$nin": [10, 20] } }));
        assert!(!matches(doc! { "tags": { "$nin": ["admin"] } }));
    }

    #[test]
    fn existence() {
        assert!(matches(doc! { "nickname": { "$exists": true } }));
        assert!(matches(doc! { "missing": { "$exists": false } }));
        assert!(!matches(doc! { "address.c": { "$exists": false } }));
    }

    #[test]
    fn patterns() {
        assert!(matches(doc! { "n": { "$regex": "^Al" } }));
        assert!(!matches(doc! { "n": { "$regex": "^al" } }));
        assert!(matches(doc! { "n": { "$regex": "^al", "$options": "i" } }));
        assert!(matches(doc! { "n": { "$regex": "A.ice" } }));
        assert!(matches(doc! { "tags": { "$regex": "taf" } }));
    }

    #[test]
    fn negation() {
        assert!(matches(doc! { "age": { "$not": { "$gt": 40 } } }));
        assert!(!matches(doc! { "n": { "$not": { "$regex": "^A" } } }));
        assert!(matches(doc! { "missing": { "$not": { "$gt": 1 } } }));
    }

    #[test]
    fn logical_operators() {
        assert!(matches(doc! { "$or": [{ "n": "Bob" }, { "age": 30 }] }));
        assert!(!matches(doc! { "$and": [{ "n": "Alice" }, { "age": 31 }] }));
        assert!(matches(doc! { "$nor": [{ "n": "Bob" }, { "age": 31 }] }));
        assert!(!matches(doc! { "$nor": [{}] }));
    }

    #[test]
    fn operator_documents_differ_from_literal_documents() {
        assert!(matches(doc! { "address": { "c": "Berlin", "zip": "10115" } }));
        assert!(!matches(doc! { "address": { "c": "Berlin" } }));
        assert!(matches(doc! { "address.c": { "$eq": "Berlin" } }));
    }

    #[test]
    fn unsupported_operators_are_errors() {
        let empty = Document::new();
        let evaluator = DocumentEvaluator::new(&empty);

        assert!(matches!(
            evaluator.evaluate(&doc! { "a": { "$where": "x" } }),
            Err(MapperError::Backend(_))
        ));
        assert!(matches!(evaluator.evaluate(&doc! { "$or": 1 }), Err(MapperError::Backend(_))));
    }

    #[test]
    fn sort_order_ranks_types() {
        let null = Bson::Null;
        let number = Bson::Int32(5);
        let text = Bson::from("a");

        assert_eq!(Comparable::from(&null).sort_order(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).sort_order(&Comparable::from(&number)), Ordering::Greater);
        assert_eq!(
            Comparable::from(&Bson::Int32(2)).sort_order(&Comparable::from(&Bson::Double(2.5))),
            Ordering::Less
        );
    }
}

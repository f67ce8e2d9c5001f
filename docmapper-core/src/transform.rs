//! Compiles keyword-style filters into store query fragments.
//!
//! A filter key is split on `__`. When the last segment names an [`Operator`] it selects the
//! operator and the remaining segments form the field path. Otherwise the whole key is a path
//! compared for equality, which lets callers reach into embedded documents and into storage
//! paths that are not declared as fields. A `not` segment right before the operator negates it,
//! e.g. `age__not__gt`.
//!
//! Every path is resolved against the document type, each segment contributing its storage name,
//! and the operand is coerced by the last resolved field. The resulting fragments are merged in
//! key order.

use bson::{Bson, Document};

use crate::{
    error::{MapperError, MapperResult},
    filter::{FilterArg, Filters, RAW_KEY},
    fragment::QueryFragment,
    operator::Operator,
    schema::{DocumentType, PathSegment, join_storage_path},
    value::Value,
};

const SEPARATOR: &str = "__";

/// A filter key split into its logical path and operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// The dotted logical field path.
    pub path: String,
    pub operator: Operator,
    /// Set by a `not` segment preceding the operator.
    pub negated: bool,
    /// Set when the key has several segments but no operator suffix.
    pub implicit_traversal: bool,
}

/// Splits a filter key into path and operator.
pub fn parse_key(key: &str) -> ParsedKey {
    let mut segments: Vec<&str> = key.split(SEPARATOR).collect();
    let mut operator = Operator::Equals;
    let mut negated = false;
    let mut implicit_traversal = false;

    if segments.len() > 1 {
        match segments.last().and_then(|last| Operator::from_key(last)) {
            Some(found) => {
                segments.pop();
                operator = found;

                if found != Operator::Not && segments.len() > 1 && segments.last() == Some(&"not") {
                    segments.pop();
                    negated = true;
                }
            }
            None => implicit_traversal = true,
        }
    }

    ParsedKey {
        path: segments.join("."),
        operator,
        negated,
        implicit_traversal,
    }
}

/// One compiled filter, ready to be rendered as a fragment or as its negation.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Field {
        /// The dot-joined storage path.
        path: String,
        operator: Operator,
        negated: bool,
        /// The coerced operand.
        value: Bson,
    },
    /// A pass-through expression from the `raw` key.
    Raw(Document),
}

impl Predicate {
    pub fn into_query(self) -> QueryFragment {
        match self {
            Predicate::Field { path, operator, negated: false, value } => operator.to_query(&path, value),
            Predicate::Field { path, operator, negated: true, value } => operator.to_negated_query(&path, value),
            Predicate::Raw(document) => document.into(),
        }
    }

    /// Renders the negated predicate. Field predicates stay scoped to their path, while a raw
    /// expression is wrapped in `$nor`.
    pub fn into_negated_query(self) -> QueryFragment {
        match self {
            Predicate::Field { negated, path, operator, value } => {
                Predicate::Field { negated: !negated, path, operator, value }.into_query()
            }
            Predicate::Raw(document) => QueryFragment::single("$nor", vec![Bson::Document(document)]),
        }
    }
}

/// Compiles one filter against the document type.
///
/// # Errors
///
/// - [`MapperError::UnresolvableFieldPath`] when the key's path does not resolve.
/// - [`MapperError::Coercion`] naming the key when the operand cannot be coerced.
/// - [`MapperError::InvalidRawQuery`] when the `raw` key does not carry a mapping.
pub fn compile_filter(document_type: &DocumentType, key: &str, arg: &FilterArg) -> MapperResult<Predicate> {
    if key == RAW_KEY {
        return raw_expression(arg).map(Predicate::Raw);
    }

    let parsed = parse_key(key);
    let segments = resolve(document_type, key, &parsed.path)?;
    let field = segments.last().and_then(PathSegment::field);

    let value = match arg {
        FilterArg::Value(value) => parsed
            .operator
            .get_value(field, value)
            .map_err(|source| MapperError::coercion(key, source))?,
        FilterArg::Raw(document) => Bson::Document(document.clone()),
    };

    Ok(Predicate::Field {
        path: join_storage_path(&segments),
        operator: parsed.operator,
        negated: parsed.negated,
        value,
    })
}

/// Compiles every filter in key order.
pub fn compile_filters(document_type: &DocumentType, filters: &Filters) -> MapperResult<Vec<Predicate>> {
    filters
        .iter()
        .map(|(key, arg)| compile_filter(document_type, key, arg))
        .collect()
}

/// Compiles a filter set into one fragment by merging every predicate in key order.
pub fn transform(document_type: &DocumentType, filters: &Filters) -> MapperResult<QueryFragment> {
    Ok(compile_filters(document_type, filters)?
        .into_iter()
        .fold(QueryFragment::new(), |query, predicate| query.merged(predicate.into_query())))
}

/// Checks every filter key before a query is built.
///
/// # Errors
///
/// - [`MapperError::UnresolvableFieldPath`] when a key's path does not resolve.
/// - [`MapperError::InvalidOperatorUsage`] when a key traverses a plain declared field without
///   naming an operator. Embedded document and list fields may be traversed implicitly.
pub fn validate_fields(document_type: &DocumentType, filters: &Filters) -> MapperResult<()> {
    for key in filters.keys().filter(|key| *key != RAW_KEY) {
        let parsed = parse_key(key);
        let segments = resolve(document_type, key, &parsed.path)?;

        if !parsed.implicit_traversal {
            continue;
        }

        if let Some(PathSegment::Field(field)) = segments.first() {
            if !field.kind().is_embedded() && !field.kind().is_list() {
                return Err(MapperError::InvalidOperatorUsage(key.to_string()));
            }
        }
    }

    Ok(())
}

fn resolve<'a>(document_type: &'a DocumentType, key: &str, path: &str) -> MapperResult<Vec<PathSegment<'a>>> {
    document_type.get_fields(path).map_err(|err| match err {
        MapperError::UnresolvableFieldPath(_) => MapperError::UnresolvableFieldPath(key.to_string()),
        other => other,
    })
}

fn raw_expression(arg: &FilterArg) -> MapperResult<Document> {
    match arg {
        FilterArg::Raw(document) => Ok(document.clone()),
        FilterArg::Value(value @ (Value::Map(_) | Value::Document(_) | Value::Json(_))) => match value.to_bson() {
            Bson::Document(document) => Ok(document),
            other => Err(MapperError::InvalidRawQuery(format!("expected a mapping, got {other}"))),
        },
        FilterArg::Value(other) => Err(MapperError::InvalidRawQuery(format!(
            "expected a mapping, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bson::doc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        field::{EmbeddedDocumentField, Field, IntField, ListField, StringField, UuidField},
        filters,
        value::uuid_to_bson,
    };

    fn user() -> Arc<DocumentType> {
        let address = DocumentType::builder("Address")
            .field(Field::new("street", StringField::new()))
            .field(Field::new("city", StringField::new()).db_field("c"))
            .build()
            .unwrap();

        DocumentType::builder("User")
            .field(Field::new("email", StringField::new()).db_field("e"))
            .field(Field::new("age", IntField::new()))
            .field(Field::new("uuid", UuidField::new()))
            .field(Field::new("address", EmbeddedDocumentField::new(address.clone())))
            .field(Field::new("past", ListField::new(EmbeddedDocumentField::new(address))))
            .field(Field::new("tags", ListField::new(StringField::new())))
            .build()
            .unwrap()
    }

    #[test]
    fn parses_operators_and_paths() {
        assert_eq!(
            parse_key("age__gt"),
            ParsedKey { path: "age".into(), operator: Operator::Gt, negated: false, implicit_traversal: false }
        );
        assert_eq!(
            parse_key("address__city"),
            ParsedKey { path: "address.city".into(), operator: Operator::Equals, negated: false, implicit_traversal: true }
        );
        assert_eq!(
            parse_key("age__not__gt"),
            ParsedKey { path: "age".into(), operator: Operator::Gt, negated: true, implicit_traversal: false }
        );
        assert_eq!(parse_key("age__not").operator, Operator::Not);
        assert_eq!(parse_key("age").path, "age");
        assert_eq!(parse_key("not__gt").path, "not");
    }

    #[test]
    fn range_filters_merge_on_one_path() {
        let query = transform(&user(), &filters! { "age__gt" => 8, "age__lt" => 11 }).unwrap();

        assert_eq!(query, doc! { "age": { "$gt": 8, "$lt": 11 } });
    }

    #[test]
    fn transform_is_deterministic() {
        let left = transform(&user(), &filters! { "age__lt" => 11, "email" => "a@b.com", "age__gt" => 8 }).unwrap();
        let right = transform(&user(), &filters! { "email" => "a@b.com", "age__gt" => 8, "age__lt" => 11 }).unwrap();

        assert_eq!(left, right);
        assert_eq!(
            left.as_document().keys().collect::<Vec<_>>(),
            vec!["age", "e"]
        );
    }

    #[test]
    fn nested_paths_use_storage_names() {
        let query = transform(&user(), &filters! { "address__city" => "Rio", "past__city__startswith" => "S" }).unwrap();

        assert_eq!(query, doc! { "address.c": "Rio", "past.c": { "$regex": "^S" } });
    }

    #[test]
    fn undeclared_paths_pass_through() {
        let query = transform(&user(), &filters! { "address__zip" => "123", "nickname__ne" => "x" }).unwrap();

        assert_eq!(query, doc! { "address.zip": "123", "nickname": { "$ne": "x" } });
    }

    #[test]
    fn textual_uuid_is_coerced() {
        let id = Uuid::new_v4();
        let query = transform(&user(), &filters! { "uuid" => id.to_string() }).unwrap();

        assert_eq!(query, doc! { "uuid": uuid_to_bson(&id) });
    }

    #[test]
    fn coercion_errors_name_the_key() {
        let err = transform(&user(), &filters! { "age__gt" => "eight" }).unwrap_err();

        assert!(matches!(err, MapperError::Coercion { field, .. } if field == "age__gt"));
    }

    #[test]
    fn not_segments_negate_the_operator() {
        let query = transform(&user(), &filters! { "age__not__gt" => 5, "email__not" => "x", "tags__not__in" => vec!["a"] }).unwrap();

        assert_eq!(
            query,
            doc! { "age": { "$not": { "$gt": 5 } }, "e": { "$ne": "x" }, "tags": { "$nin": ["a"] } }
        );
    }

    #[test]
    fn raw_filters_are_merged_verbatim() {
        let query = transform(&user(), &Filters::new().with("age", 3).raw(doc! { "$or": [{ "a": 1 }, { "b": 2 }] })).unwrap();

        assert_eq!(query, doc! { "age": 3, "$or": [{ "a": 1 }, { "b": 2 }] });
    }

    #[test]
    fn raw_filter_must_be_a_mapping() {
        let err = transform(&user(), &filters! { "raw" => 3 }).unwrap_err();

        assert!(matches!(err, MapperError::InvalidRawQuery(_)));
        assert!(transform(&user(), &filters! { "raw" => doc! { "x": 1 } }).is_ok());
    }

    #[test]
    fn plain_fields_need_an_operator_to_be_traversed() {
        let err = validate_fields(&user(), &filters! { "email__invalid" => "x" }).unwrap_err();

        assert!(matches!(&err, MapperError::InvalidOperatorUsage(key) if key == "email__invalid"));
        assert_eq!(
            err.to_string(),
            "Invalid filter 'email__invalid': Invalid operator (if this is a sub-property, then it must be used in embedded document fields)."
        );
    }

    #[test]
    fn embedded_and_list_fields_can_be_traversed() {
        let filters = filters! {
            "address__city" => "Rio",
            "address__zip" => "1",
            "past__city" => "SP",
            "tags__0" => "a",
            "extra__anything" => 1,
            "raw" => doc! {},
        };

        assert!(validate_fields(&user(), &filters).is_ok());
    }

    #[test]
    fn unresolvable_paths_name_the_key() {
        let strict = DocumentType::builder("Strict")
            .field(Field::new("name", StringField::new()))
            .strict()
            .build()
            .unwrap();

        let err = validate_fields(&strict, &filters! { "nickname__gt" => 1 }).unwrap_err();

        assert!(matches!(err, MapperError::UnresolvableFieldPath(key) if key == "nickname__gt"));
    }

    #[test]
    fn negated_raw_predicates_use_nor() {
        let predicate = compile_filter(&user(), RAW_KEY, &FilterArg::Raw(doc! { "a": 1 })).unwrap();

        assert_eq!(predicate.into_negated_query(), doc! { "$nor": [{ "a": 1 }] });
    }
}

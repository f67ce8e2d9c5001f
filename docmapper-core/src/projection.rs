//! Field-limited queries: logical field names to storage projections.

use bson::{Bson, Document};

use crate::{error::MapperResult, schema::DocumentType, value::Record};

/// Maps requested logical fields to an inclusion projection over storage paths.
///
/// Nested fields may be named with either `__` or `.` between segments. The identifier key
/// passes through unchanged. Returns `None` when nothing was requested, meaning no restriction.
///
/// # Errors
///
/// Returns [`MapperError::UnresolvableFieldPath`](crate::error::MapperError::UnresolvableFieldPath)
/// when a requested field does not resolve.
pub fn transform_field_list<S: AsRef<str>>(
    document_type: &DocumentType,
    fields: &[S],
) -> MapperResult<Option<Document>> {
    let selection: Vec<(&str, bool)> = fields.iter().map(|field| (field.as_ref(), true)).collect();

    transform_field_selection(document_type, &selection)
}

/// Like [`transform_field_list`], with each field marked as included (`1`) or excluded (`0`).
///
/// Stores reject projections that mix both, apart from excluding the identifier.
pub fn transform_field_selection<S: AsRef<str>>(
    document_type: &DocumentType,
    fields: &[(S, bool)],
) -> MapperResult<Option<Document>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut projection = Document::new();

    for (field, include) in fields {
        let field = field.as_ref();

        let path = if field == Record::ID {
            field.to_string()
        } else {
            document_type.storage_path(&field.replace("__", "."))?
        };

        projection.insert(path, Bson::Int32(i32::from(*include)));
    }

    Ok(Some(projection))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bson::doc;

    use super::*;
    use crate::field::{EmbeddedDocumentField, Field, StringField};

    fn user() -> Arc<DocumentType> {
        let address = DocumentType::builder("Address")
            .field(Field::new("city", StringField::new()).db_field("c"))
            .build()
            .unwrap();

        DocumentType::builder("User")
            .field(Field::new("email", StringField::new()).db_field("e"))
            .field(Field::new("address", EmbeddedDocumentField::new(address)))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_requests_do_not_restrict() {
        assert_eq!(transform_field_list::<&str>(&user(), &[]).unwrap(), None);
    }

    #[test]
    fn requested_fields_map_to_storage_paths() {
        let projection = transform_field_list(&user(), &["_id", "email", "address__city", "address.city"]).unwrap();

        assert_eq!(projection, Some(doc! { "_id": 1, "e": 1, "address.c": 1 }));
    }

    #[test]
    fn excluded_fields_map_to_zero() {
        let projection = transform_field_selection(&user(), &[("_id", false), ("address__city", false)]).unwrap();

        assert_eq!(projection, Some(doc! { "_id": 0, "address.c": 0 }));
    }
}

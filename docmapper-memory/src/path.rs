//! Dotted-path access into BSON documents.

use bson::{Bson, Document};

/// Collects every value reachable by `path`.
///
/// Arrays are traversed: a numeric segment selects an element, any other segment is looked up
/// in each embedded document of the array. A missing path yields no values.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let mut found = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            descend(value, rest, &mut found);
        }
    }

    found
}

fn descend<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(document) => {
            if let Some(next) = document.get(*head) {
                descend(next, rest, found);
            }
        }
        Bson::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    descend(item, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    if let Bson::Document(_) = item {
                        descend(item, segments, found);
                    }
                }
            }
        },
        _ => {}
    }
}

/// Reads the value at `path`, descending through embedded documents only.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => document.get(path),
        Some((head, rest)) => match document.get(head) {
            Some(Bson::Document(nested)) => get_path(nested, rest),
            _ => None,
        },
    }
}

/// Writes `value` at `path`, creating or overwriting intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(nested)) = document.get_mut(head) {
                set_path(nested, rest, value);
            }
        }
    }
}

/// Removes and returns the value at `path`, if present.
pub(crate) fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(nested)) => remove_path(nested, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use bson::{Bson, doc};

    use super::*;

    #[test]
    fn lookup_traverses_arrays_of_documents() {
        let document = doc! {
            "tags": ["a", "b"],
            "items": [{ "sku": "x" }, { "sku": "y" }, { "other": 1 }],
        };

        assert_eq!(lookup(&document, "tags"), vec![&Bson::Array(vec!["a".into(), "b".into()])]);
        assert_eq!(lookup(&document, "items.sku"), vec![&Bson::from("x"), &Bson::from("y")]);
        assert_eq!(lookup(&document, "items.1.sku"), vec![&Bson::from("y")]);
        assert!(lookup(&document, "items.missing").is_empty());
        assert!(lookup(&document, "missing").is_empty());
    }

    #[test]
    fn set_and_remove_nested_paths() {
        let mut document = doc! { "a": 1 };

        set_path(&mut document, "address.city", "Berlin".into());
        set_path(&mut document, "a.b", 2.into());

        assert_eq!(document, doc! { "a": { "b": 2 }, "address": { "city": "Berlin" } });
        assert_eq!(get_path(&document, "address.city"), Some(&Bson::from("Berlin")));

        assert_eq!(remove_path(&mut document, "address.city"), Some(Bson::from("Berlin")));
        assert_eq!(remove_path(&mut document, "address.zip"), None);
        assert_eq!(document, doc! { "a": { "b": 2 }, "address": {} });
    }
}

//! End-to-end filtering against the in-memory backend.

mod common;

use common::{memory_store, names, person, person_type};
use docmapper::{memory::InMemoryStore, prelude::*};
use uuid::Uuid;

async fn seed(users: &Collection<'_, InMemoryStore>) {
    for (name, age) in [("Carol", 12), ("Alice", 7), ("Bob", 10)] {
        users.create(person(name, age)).await.unwrap();
    }
}

#[tokio::test]
async fn range_filters_on_one_field_combine() {
    let test_type = DocumentType::builder("Test")
        .field(Field::new("test", IntField::new()))
        .build()
        .unwrap();
    let store = memory_store().await;
    let tests = store.collection(&test_type);

    for value in [7, 10, 12] {
        tests.create(Record::new().with("test", value)).await.unwrap();
    }

    let query = tests
        .objects()
        .filter(filters! { "test__gt" => 8, "test__lt" => 11 })
        .unwrap();

    let found = tests.find_all(&query).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("test"), Some(&Value::Int(10)));
}

#[tokio::test]
async fn uuid_fields_match_textual_filters() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    let external_id = Uuid::new_v4();

    users
        .create(person("Alice", 30).with("external_id", external_id))
        .await
        .unwrap();
    users
        .create(person("Bob", 40).with("external_id", Uuid::new_v4()))
        .await
        .unwrap();

    let query = users
        .objects()
        .filter(filters! { "external_id" => external_id.to_string() })
        .unwrap();

    let found = users.find_one(&query).await.unwrap().unwrap();

    assert_eq!(found.get("name"), Some(&Value::from("Alice")));
    assert_eq!(found.get("external_id"), Some(&Value::Uuid(external_id)));
}

#[tokio::test]
async fn embedded_paths_use_storage_names() {
    let store = memory_store().await;
    let users = store.collection(&person_type());

    users
        .create(person("Alice", 30).with("address", Record::new().with("city", "Berlin")))
        .await
        .unwrap();
    users
        .create(person("Bob", 40).with("address", Record::new().with("city", "Oslo")))
        .await
        .unwrap();

    let query = users
        .objects()
        .filter(filters! { "address__city" => "Berlin" })
        .unwrap();

    assert_eq!(query.compile().unwrap().filter, doc! { "address.c": "Berlin" });
    assert_eq!(names(&users.find_all(&query).await.unwrap()), vec!["Alice"]);
}

#[tokio::test]
async fn list_of_embedded_documents_matches_any_element() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    let order = |sku: &str, qty: i64| Record::new().with("sku", sku).with("qty", qty);

    users
        .create(person("Alice", 30).with("orders", vec![order("a-1", 1), order("b-2", 5)]))
        .await
        .unwrap();
    users
        .create(person("Bob", 40).with("orders", vec![order("c-3", 2)]))
        .await
        .unwrap();

    let by_sku = users
        .objects()
        .filter(filters! { "orders__sku" => "b-2" })
        .unwrap();
    let by_qty = users
        .objects()
        .filter(filters! { "orders__qty__gte" => 2 })
        .unwrap();

    assert_eq!(names(&users.find_all(&by_sku).await.unwrap()), vec!["Alice"]);
    assert_eq!(names(&users.find_all(&by_qty).await.unwrap()), vec!["Alice", "Bob"]);
}

#[tokio::test]
async fn scalar_values_match_list_members() {
    let store = memory_store().await;
    let users = store.collection(&person_type());

    users
        .create(person("Alice", 30).with("tags", vec!["admin", "staff"]))
        .await
        .unwrap();
    users
        .create(person("Bob", 40).with("tags", vec!["guest"]))
        .await
        .unwrap();

    let query = users
        .objects()
        .filter(filters! { "tags" => "staff" })
        .unwrap();

    assert_eq!(names(&users.find_all(&query).await.unwrap()), vec!["Alice"]);
}

#[tokio::test]
async fn unknown_operator_on_scalar_field_is_rejected() {
    let store = memory_store().await;
    let users = store.collection(&person_type());

    let result = users.objects().filter(filters! { "name__invalid" => "x" });

    match result {
        Err(err @ MapperError::InvalidOperatorUsage(_)) => assert_eq!(
            err.to_string(),
            "Invalid filter 'name__invalid': Invalid operator (if this is a sub-property, then it must be used in embedded document fields)."
        ),
        other => panic!("expected InvalidOperatorUsage, got {other:?}"),
    }
}

#[tokio::test]
async fn negated_filters() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    seed(&users).await;

    let not_older = users
        .objects()
        .filter_not(filters! { "age__gt" => 9 })
        .unwrap();
    let not_bob = users
        .objects()
        .filter(filters! { "name__not" => "Bob" })
        .unwrap();
    let not_prefixed = users
        .objects()
        .filter(filters! { "name__not__istartswith" => "c" })
        .unwrap();

    assert_eq!(names(&users.find_all(&not_older).await.unwrap()), vec!["Alice"]);
    assert_eq!(names(&users.find_all(&not_bob).await.unwrap()), vec!["Carol", "Alice"]);
    assert_eq!(names(&users.find_all(&not_prefixed).await.unwrap()), vec!["Alice", "Bob"]);
}

#[tokio::test]
async fn membership_filters() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    seed(&users).await;

    let within = users
        .objects()
        .filter(filters! { "age__in" => vec![7, 12] })
        .unwrap();
    let outside = users
        .objects()
        .filter(filters! { "age__not__in" => vec![7, 12] })
        .unwrap();

    assert_eq!(names(&users.find_all(&within).await.unwrap()), vec!["Carol", "Alice"]);
    assert_eq!(names(&users.find_all(&outside).await.unwrap()), vec!["Bob"]);
}

#[tokio::test]
async fn existence_and_null_filters() {
    let store = memory_store().await;
    let users = store.collection(&person_type());

    users
        .create(person("Alice", 30).with("address", Record::new().with("city", "Berlin")))
        .await
        .unwrap();
    users.create(person("Bob", 40)).await.unwrap();

    let with_address = users
        .objects()
        .filter(filters! { "address__exists" => true })
        .unwrap();
    let without_address = users
        .objects()
        .filter(filters! { "address__is_null" => true })
        .unwrap();

    assert_eq!(names(&users.find_all(&with_address).await.unwrap()), vec!["Alice"]);
    assert_eq!(names(&users.find_all(&without_address).await.unwrap()), vec!["Bob"]);
}

#[tokio::test]
async fn raw_expressions_pass_through() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    seed(&users).await;

    let query = users
        .objects()
        .filter(Filters::new().raw(doc! { "$or": [{ "age": 7 }, { "n": "Carol" }] }))
        .unwrap();

    assert_eq!(names(&users.find_all(&query).await.unwrap()), vec!["Carol", "Alice"]);
}

#[tokio::test]
async fn pattern_text_is_used_as_a_regular_expression() {
    let store = memory_store().await;
    let users = store.collection(&person_type());

    for name in ["abc", "a.c", "xyz"] {
        users.create(person(name, 1)).await.unwrap();
    }

    let query = users
        .objects()
        .filter(filters! { "name__startswith" => "a.c" })
        .unwrap();

    assert_eq!(names(&users.find_all(&query).await.unwrap()), vec!["abc", "a.c"]);
}

#[tokio::test]
async fn composed_queries() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    seed(&users).await;

    let youngest_or_oldest = Q::from(filters! { "age__lt" => 8 }) | Q::from(filters! { "age__gt" => 11 });
    let query = users
        .objects()
        .filter(youngest_or_oldest & !Q::from(filters! { "name" => "Carol" }))
        .unwrap();

    assert_eq!(names(&users.find_all(&query).await.unwrap()), vec!["Alice"]);
    assert_eq!(users.count(&query).await.unwrap(), 1);
}

#[tokio::test]
async fn ordering_paging_and_projection() {
    let store = memory_store().await;
    let users = store.collection(&person_type());
    seed(&users).await;

    let query = users
        .objects()
        .order_by("age", SortDirection::Asc)
        .unwrap()
        .skip(1)
        .limit(2)
        .only(&["name"]);

    let found = users.find_all(&query).await.unwrap();

    assert_eq!(names(&found), vec!["Bob", "Carol"]);
    assert!(found.iter().all(|record| record.id().is_some() && record.get("age").is_none()));
    assert_eq!(users.count(&query).await.unwrap(), 3);
}

#[tokio::test]
async fn strict_types_reject_undeclared_paths() {
    let strict = DocumentType::builder("Strict")
        .field(Field::new("name", StringField::new()))
        .strict()
        .build()
        .unwrap();
    let store = memory_store().await;
    let records = store.collection(&strict);

    let result = records.objects().filter(filters! { "nickname" => "x" });

    assert!(matches!(result, Err(MapperError::UnresolvableFieldPath(_))));
}

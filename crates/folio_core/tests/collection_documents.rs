use folio_core::{
    init_collections, is_unique_error, open_db_in_memory, order_by_id, DbError, DbErrorCode,
    Document, IndexField, StoreConfig, ID_FIELD,
};
use serde_json::{json, Value};

#[test]
fn insert_assigns_id_and_find_by_id_returns_document() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let id = collections
        .files
        .insert_one(doc(json!({"name": "logo.png", "width": 120})))
        .unwrap();
    let stored = collections.files.find_by_id(&id).unwrap().unwrap();

    assert_eq!(stored.id, id);
    assert_eq!(stored.get(ID_FIELD), Some(&json!(id)));
    assert_eq!(stored.get("width"), Some(&json!(120)));
    assert!(collections.files.find_by_id("missing").unwrap().is_none());
}

#[test]
fn duplicate_id_is_a_unique_error() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    collections
        .files
        .insert_one(doc(json!({"_id": "f1"})))
        .unwrap();
    let err = collections
        .files
        .insert_one(doc(json!({"_id": "f1"})))
        .unwrap_err();

    assert_eq!(err.code(), Some(DbErrorCode::DuplicateKey));
    assert!(is_unique_error(Some(&err)));
}

#[test]
fn membership_query_results_are_reordered_by_requested_ids() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();
    for (id, slug) in [("a", "/a"), ("b", "/b"), ("c", "/c")] {
        collections
            .pages
            .insert_one(doc(json!({"_id": id, "slug": slug})))
            .unwrap();
    }

    let wanted = vec!["c".to_string(), "missing".to_string(), "a".to_string()];
    let found = collections.pages.find_in(&wanted).unwrap();
    assert_eq!(found.len(), 2);

    let ordered = order_by_id(&wanted, &found);
    let slugs: Vec<_> = ordered
        .iter()
        .map(|page| page.get("slug").cloned().unwrap())
        .collect();
    assert_eq!(slugs, vec![json!("/c"), json!("/a")]);
}

#[test]
fn replace_with_different_id_is_an_immutable_id_error() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();
    collections
        .pages
        .insert_one(doc(json!({"_id": "home", "slug": "/"})))
        .unwrap();

    let err = collections
        .pages
        .replace_one("home", doc(json!({"_id": "other", "slug": "/"})), true)
        .unwrap_err();

    assert_eq!(err.code(), Some(DbErrorCode::ImmutableIdField));
    assert!(is_unique_error(Some(&err)));
}

#[test]
fn replace_with_different_id_matches_nothing_when_target_is_missing() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let replaced = collections
        .pages
        .replace_one("ghost", doc(json!({"_id": "other", "slug": "/ghost"})), false)
        .unwrap();

    assert!(!replaced);
    assert_eq!(collections.pages.count().unwrap(), 0);

    let err = collections
        .pages
        .replace_one("ghost", doc(json!({"_id": "other", "slug": "/ghost"})), true)
        .unwrap_err();
    assert_eq!(err.code(), Some(DbErrorCode::ImmutableIdField));
    assert_eq!(collections.pages.count().unwrap(), 0);
}

#[test]
fn replace_onto_taken_slug_is_a_duplicate_on_update() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();
    collections
        .pages
        .insert_one(doc(json!({"_id": "p1", "slug": "/one"})))
        .unwrap();
    collections
        .pages
        .insert_one(doc(json!({"_id": "p2", "slug": "/two"})))
        .unwrap();

    let err = collections
        .pages
        .replace_one("p2", doc(json!({"slug": "/one"})), false)
        .unwrap_err();

    assert_eq!(err.code(), Some(DbErrorCode::DuplicateKeyOnUpdate));
    assert!(is_unique_error(Some(&err)));
    let unchanged = collections.pages.find_by_id("p2").unwrap().unwrap();
    assert_eq!(unchanged.get("slug"), Some(&json!("/two")));
}

#[test]
fn replace_without_upsert_leaves_missing_documents_alone() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let replaced = collections
        .pages
        .replace_one("ghost", doc(json!({"slug": "/ghost"})), false)
        .unwrap();
    assert!(!replaced);
    assert_eq!(collections.pages.count().unwrap(), 0);

    let upserted = collections
        .pages
        .replace_one("ghost", doc(json!({"slug": "/ghost"})), true)
        .unwrap();
    assert!(upserted);
    let stored = collections.pages.find_by_id("ghost").unwrap().unwrap();
    assert_eq!(stored.get(ID_FIELD), Some(&json!("ghost")));
}

#[test]
fn retry_with_regenerated_slug_succeeds_after_unique_error() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();
    collections
        .pages
        .insert_one(doc(json!({"slug": "/post"})))
        .unwrap();

    let mut slug = "/post".to_string();
    let mut attempts = 0;
    let id = loop {
        attempts += 1;
        match collections.pages.insert_one(doc(json!({"slug": slug}))) {
            Ok(id) => break id,
            Err(err) if is_unique_error(Some(&err)) && attempts < 5 => {
                slug = format!("/post{attempts}");
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    };

    assert_eq!(attempts, 2);
    let stored = collections.pages.find_by_id(&id).unwrap().unwrap();
    assert_eq!(stored.get("slug"), Some(&json!("/post1")));
}

#[test]
fn find_eq_filters_and_sorts() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();
    for (slug, tag) in [("/b", "news"), ("/a", "news"), ("/c", "blog")] {
        collections
            .pages
            .insert_one(doc(json!({"slug": slug, "section": tag})))
            .unwrap();
    }

    let news = collections
        .pages
        .find_eq("section", &json!("news"), &[IndexField::asc("slug")])
        .unwrap();
    let slugs: Vec<_> = news.iter().map(|page| page.get("slug").cloned()).collect();
    assert_eq!(slugs, vec![Some(json!("/a")), Some(json!("/b"))]);
}

#[test]
fn unsafe_field_names_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let err = collections
        .pages
        .find_eq("slug') OR 1=1 --", &Value::Null, &[])
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidName(_)));
}

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

use folio_core::{
    init_collections, open_db_in_memory, versions_for_page, IndexField, StoreConfig,
    VersionRecord, VersionSubject,
};
use serde_json::json;

fn version_at(page_id: &str, created_at: i64) -> VersionRecord {
    let mut version = VersionRecord::for_page(page_id, "editor", json!({"rev": created_at}));
    version.created_at = created_at;
    version
}

#[test]
fn page_history_is_newest_first_regardless_of_insert_order() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    for created_at in [2_000, 5_000, 1_000, 4_000, 3_000] {
        let version = version_at("home", created_at);
        collections
            .versions
            .insert_one(version.to_document().unwrap())
            .unwrap();
    }
    collections
        .versions
        .insert_one(version_at("about", 9_000).to_document().unwrap())
        .unwrap();

    let history = versions_for_page(&collections.versions, "home").unwrap();
    let stamps: Vec<_> = history.iter().map(|version| version.created_at).collect();
    assert_eq!(stamps, vec![5_000, 4_000, 3_000, 2_000, 1_000]);
    assert!(history
        .iter()
        .all(|version| version.subject == VersionSubject::Page("home".to_string())));
}

#[test]
fn page_history_is_read_in_index_order_without_sorting() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let plan = collections
        .versions
        .explain_find_eq("pageId", &json!("home"), &[IndexField::desc("createdAt")])
        .unwrap();

    assert!(
        plan.iter().any(|step| step.contains("pageId_1_createdAt_-1")),
        "plan should use the history index: {plan:?}"
    );
    assert!(
        !plan.iter().any(|step| step.contains("TEMP B-TREE")),
        "plan should not sort separately: {plan:?}"
    );
}

#[test]
fn area_versions_are_stored_but_not_part_of_page_history() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let area = VersionRecord::for_area("footer", "editor", json!({"items": ["(c)"]}));
    let id = collections
        .versions
        .insert_one(area.to_document().unwrap())
        .unwrap();

    let stored = collections.versions.find_by_id(&id).unwrap().unwrap();
    assert_eq!(VersionRecord::from_document(&stored).unwrap(), area);
    assert!(versions_for_page(&collections.versions, "footer")
        .unwrap()
        .is_empty());
}

#[test]
fn author_is_kept_as_plain_text() {
    let conn = open_db_in_memory().unwrap();
    let collections = init_collections(&conn, &StoreConfig::default()).unwrap();

    let version = VersionRecord::for_page("home", "Deleted User", json!({}));
    collections
        .versions
        .insert_one(version.to_document().unwrap())
        .unwrap();

    let history = versions_for_page(&collections.versions, "home").unwrap();
    assert_eq!(history[0].author, "Deleted User");
}

use serde_json::json;
use tempfile::tempdir;

use rollbook::store::{Document, Store};
use rollbook::StoreError;

fn record(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    v.as_object().expect("fixture must be an object").clone()
}

#[test]
fn missing_file_initializes_and_persists_empty_document() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("records.json");
    let store = Store::new(&path);

    let doc = store.load().expect("load");
    assert!(doc.users.is_empty());
    assert!(doc.subjects.is_empty());
    // The default was written, not just returned.
    assert!(path.exists());
    let text = std::fs::read_to_string(&path).expect("read back");
    let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(parsed["users"], json!([]));
    assert_eq!(parsed["subjects"], json!([]));
}

#[test]
fn corrupt_file_is_propagated_not_repaired() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("records.json");
    std::fs::write(&path, "{not json").expect("write garbage");

    let store = Store::new(&path);
    match store.load() {
        Err(StoreError::Corrupt { .. }) => {}
        other => panic!("expected Corrupt, got {:?}", other.map(|_| ())),
    }
    // File untouched.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
}

#[test]
fn save_load_roundtrip_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let store = Store::new(dir.path().join("records.json"));

    let mut doc = Document::default();
    doc.add_user(record(json!({
        "username": "bob",
        "role": "Student",
        "password": "pw",
        "grades": { "MATH101": { "quiz1": 85.0 } },
        "attendance": { "MATH101": ["2024-01-01"] }
    })));
    doc.add_subject(record(json!({
        "code": "MATH101",
        "name": "Mathematics",
        "teacher": null,
        "students": ["bob"]
    })));

    store.save(&doc).expect("save");
    let loaded = store.load().expect("load");
    assert_eq!(loaded, doc);

    store.save(&loaded).expect("save again");
    assert_eq!(store.load().expect("load again"), doc);
}

#[test]
fn delete_user_on_missing_name_is_a_noop() {
    let mut doc = Document::default();
    doc.add_user(record(json!({ "username": "bob", "role": "Student" })));
    let before = doc.clone();

    assert!(!doc.delete_user("nobody"));
    assert_eq!(doc, before);
}

#[test]
fn delete_user_removes_every_matching_record() {
    // The store accepts duplicates silently; deletion must clear them all.
    let mut doc = Document::default();
    doc.add_user(record(json!({ "username": "bob", "role": "Student" })));
    doc.add_user(record(json!({ "username": "bob", "role": "Teacher" })));
    doc.add_user(record(json!({ "username": "eve", "role": "Admin" })));

    assert!(doc.delete_user("bob"));
    assert_eq!(doc.users.len(), 1);
    assert_eq!(doc.users[0]["username"], "eve");
}

#[test]
fn duplicate_usernames_first_match_wins_on_lookup() {
    let mut doc = Document::default();
    doc.add_user(record(json!({ "username": "bob", "role": "Student" })));
    doc.add_user(record(json!({ "username": "bob", "role": "Teacher" })));

    let found = doc.find_user("bob").expect("found");
    assert_eq!(found["role"], "Student");
}

#[test]
fn update_merge_patches_only_the_first_match() {
    let mut doc = Document::default();
    doc.add_user(record(json!({ "username": "bob", "role": "Student", "password": "old" })));
    doc.add_user(record(json!({ "username": "bob", "role": "Teacher", "password": "old" })));

    let patched = doc.update_user("bob", &record(json!({ "password": "new", "extra": 1 })));
    assert!(patched);
    assert_eq!(doc.users[0]["password"], "new");
    assert_eq!(doc.users[0]["extra"], 1);
    // Untouched fields and records survive.
    assert_eq!(doc.users[0]["role"], "Student");
    assert_eq!(doc.users[1]["password"], "old");

    assert!(!doc.update_user("nobody", &record(json!({ "password": "x" }))));
}

#[test]
fn subjects_have_the_same_keyed_surface() {
    let mut doc = Document::default();
    doc.add_subject(record(json!({ "code": "MATH101", "name": "Mathematics" })));

    assert!(doc.find_subject("MATH101").is_some());
    assert!(doc.find_subject("SCI200").is_none());
    assert!(doc.update_subject("MATH101", &record(json!({ "teacher": "alice" }))));
    assert_eq!(doc.subjects[0]["teacher"], "alice");
    assert!(doc.delete_subject("MATH101"));
    assert!(!doc.delete_subject("MATH101"));
}

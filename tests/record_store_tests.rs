// tests/record_store_tests.rs
// Collection CRUD, quota discipline, and the serialized read-modify-write
// guarantee of the record store.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use memorylane_core::entities::{Record, Senior, Story};
use memorylane_core::errors::StoreError;
use memorylane_core::services::RecordStore;

fn open_store(dir: &TempDir, quota_bytes: usize) -> RecordStore {
    RecordStore::open(&dir.path().join("records.db"), quota_bytes).expect("open store")
}

fn ann() -> Senior {
    Senior {
        name: "Ann".into(),
        birth_year: Some(1940),
        ..Default::default()
    }
}

fn story(title: &str) -> Story {
    Story {
        senior_id: "s1".into(),
        title: title.into(),
        ..Default::default()
    }
}

// Serialized size of one persisted story. Ids are 13-digit millisecond
// timestamps and created_date is fixed-width, so this is deterministic.
fn story_bytes(title: &str) -> usize {
    let mut sample = story(title);
    sample.assign_identity("1756000000000".into(), "2026-08-29T12:00:00.000Z".into());
    serde_json::to_string(&sample).expect("serialize sample").len()
}

#[test]
fn create_assigns_identity_and_filter_finds_it() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let created = store.create(ann()).expect("create");
    assert!(!created.id.is_empty());
    assert!(created.created_date.is_some());
    assert_eq!(created.birth_year, Some(1940));

    let found: Vec<Senior> = store.filter(&[("id", json!(created.id))]).expect("filter");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], created);
}

#[test]
fn list_returns_empty_for_absent_collection() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let seniors: Vec<Senior> = store.list(None, None).expect("list");
    assert!(seniors.is_empty());
}

#[test]
fn update_missing_id_returns_none_and_leaves_collection_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let created = store.create(ann()).expect("create");
    let updated: Option<Senior> = store
        .update("does-not-exist", json!({ "name": "Changed" }))
        .expect("update");
    assert!(updated.is_none());

    let all: Vec<Senior> = store.list(None, None).expect("list");
    assert_eq!(all, vec![created]);
}

#[test]
fn update_merges_shallow_and_patch_wins() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let created = store.create(ann()).expect("create");
    let updated: Senior = store
        .update(&created.id, json!({ "nickname": "Granny", "birth_year": 1941 }))
        .expect("update")
        .expect("found");

    assert_eq!(updated.name, "Ann");
    assert_eq!(updated.nickname.as_deref(), Some("Granny"));
    assert_eq!(updated.birth_year, Some(1941));

    let reread: Vec<Senior> = store.filter(&[("id", json!(created.id))]).expect("filter");
    assert_eq!(reread[0], updated);
}

#[test]
fn story_collection_caps_at_fifty_evicting_oldest() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let mut ids = Vec::new();
    for n in 0..51 {
        let created = store.create(story(&format!("story-{n}"))).expect("create");
        ids.push(created.id);
    }

    let all: Vec<Story> = store.list(None, None).expect("list");
    assert_eq!(all.len(), 50);
    // Newest first: the 51st create sits at the front, the very first
    // story has been evicted.
    assert_eq!(all[0].title, "story-50");
    assert!(all.iter().all(|s| s.id != ids[0]));
    assert!(all.iter().any(|s| s.id == ids[50]));
}

#[test]
fn quota_overflow_on_create_silently_shrinks_to_twenty() {
    let dir = TempDir::new().unwrap();
    let big_title = "x".repeat(1000);
    let per_story = story_bytes(&big_title) + 1; // +1 for the array comma
    // Room for 20 stories plus slack, but never 21.
    let store = open_store(&dir, 20 * per_story + per_story / 2);

    let mut last_id = String::new();
    for _ in 0..30 {
        let created = store.create(story(&big_title)).expect("create survives quota");
        last_id = created.id;
    }

    let all: Vec<Story> = store.list(None, None).expect("list");
    assert_eq!(all.len(), 20);
    assert_eq!(all[0].id, last_id, "newest record survives the shrink");
}

#[test]
fn quota_overflow_on_update_surfaces_exhausted_after_shrink() {
    let dir = TempDir::new().unwrap();
    let per_story = story_bytes("small") + 1;
    let store = open_store(&dir, 3 * per_story);

    let created = store.create(story("small")).expect("create");

    // A patch far beyond the whole quota fails even after the retention
    // window shrinks around the single record.
    let huge = "y".repeat(5 * per_story);
    let err = store
        .update::<Story>(&created.id, json!({ "summary": huge }))
        .expect_err("update must fail");
    assert!(matches!(err, StoreError::Exhausted));
}

#[test]
fn list_sorts_on_read_by_created_date() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    for name in ["first", "second", "third"] {
        store
            .create(Senior {
                name: name.into(),
                ..Default::default()
            })
            .expect("create");
        thread::sleep(Duration::from_millis(5));
    }

    let newest_first: Vec<Senior> = store.list(Some("-created_date"), None).expect("list");
    let names: Vec<&str> = newest_first.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["third", "second", "first"]);

    let oldest_first: Vec<Senior> = store.list(Some("created_date"), None).expect("list");
    let names: Vec<&str> = oldest_first.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
}

#[test]
fn list_limit_truncates() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    for n in 0..5 {
        store.create(story(&format!("s{n}"))).expect("create");
    }
    let some: Vec<Story> = store.list(None, Some(2)).expect("list");
    assert_eq!(some.len(), 2);
}

#[test]
fn bulk_create_assigns_base_plus_index_ids_in_one_persist() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let batch = vec![story("a"), story("b"), story("c")];
    let created = store.bulk_create(batch).expect("bulk create");

    let base: i64 = created[0].id.parse().expect("numeric id");
    for (idx, s) in created.iter().enumerate() {
        assert_eq!(s.id, (base + idx as i64).to_string());
    }

    let all: Vec<Story> = store.list(None, None).expect("list");
    assert_eq!(all.len(), 3);
    // Prepend collection: batch order preserved at the front.
    assert_eq!(all[0].title, "a");
    assert_eq!(all[2].title, "c");
}

#[test]
fn ids_are_monotonic_within_a_process() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 5 * 1024 * 1024);

    let a: i64 = store.create(ann()).unwrap().id.parse().unwrap();
    let b: i64 = store.create(ann()).unwrap().id.parse().unwrap();
    let c: i64 = store.create(ann()).unwrap().id.parse().unwrap();
    assert!(a < b && b < c);
}

#[test]
fn concurrent_updates_both_apply() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir, 5 * 1024 * 1024));

    let created = store.create(ann()).expect("create");
    let id = created.id.clone();

    let handles: Vec<_> = [
        json!({ "nickname": "Granny" }),
        json!({ "notes": "loves gardening" }),
    ]
    .into_iter()
    .map(|patch| {
        let store = Arc::clone(&store);
        let id = id.clone();
        thread::spawn(move || {
            store.update::<Senior>(&id, patch).expect("update").expect("found");
        })
    })
    .collect();
    for handle in handles {
        handle.join().expect("join");
    }

    let merged: Vec<Senior> = store.filter(&[("id", json!(id))]).expect("filter");
    assert_eq!(merged[0].nickname.as_deref(), Some("Granny"));
    assert_eq!(merged[0].notes.as_deref(), Some("loves gardening"));
}

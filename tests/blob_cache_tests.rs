// tests/blob_cache_tests.rs
// Durable image store: write/read round trips, absence as Ok(None), and
// convergence across independently opened handles.

use tempfile::TempDir;

use memorylane_core::services::BlobCache;

#[test]
fn write_then_read_round_trips() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    let written = cache
        .write(
            "img-1",
            "data:image/png;base64,CCCC",
            Some("a cat in the garden"),
            Some("image/png"),
        )
        .expect("write");
    assert!(written.timestamp > 0);

    let got = cache.read("img-1").expect("read").expect("present");
    assert_eq!(got, written);
    assert_eq!(got.url, "data:image/png;base64,CCCC");
    assert_eq!(got.prompt.as_deref(), Some("a cat in the garden"));
    assert_eq!(got.mime_type.as_deref(), Some("image/png"));
}

#[test]
fn missing_entry_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    assert!(cache.read("never-written").expect("read").is_none());
}

#[test]
fn awkward_ids_are_safe_on_disk() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    let id = "scene 3: the harbor / 1952?";
    cache
        .write(id, "data:image/png;base64,EEEE", None, None)
        .expect("write");
    let got = cache.read(id).expect("read").expect("present");
    assert_eq!(got.id, id);
}

#[test]
fn overwrite_replaces_the_entry() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    cache
        .write("img-1", "data:image/png;base64,CCCC", None, None)
        .expect("write");
    cache
        .write("img-1", "data:image/png;base64,DDDD", None, None)
        .expect("overwrite");

    let got = cache.read("img-1").expect("read").expect("present");
    assert_eq!(got.url, "data:image/png;base64,DDDD");
}

#[test]
fn delete_is_quiet_and_removes_the_entry() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    // Deleting something that was never written is not an error.
    cache.delete("ghost");

    cache
        .write("img-1", "data:image/png;base64,CCCC", None, None)
        .expect("write");
    cache.delete("img-1");
    assert!(cache.read("img-1").expect("read").is_none());
}

#[test]
fn clear_empties_the_cache() {
    let dir = TempDir::new().unwrap();
    let cache = BlobCache::open(dir.path()).expect("open");

    for id in ["a", "b", "c"] {
        cache
            .write(id, "data:image/png;base64,CCCC", None, None)
            .expect("write");
    }
    cache.clear();
    for id in ["a", "b", "c"] {
        assert!(cache.read(id).expect("read").is_none());
    }
}

#[test]
fn two_handles_over_one_root_see_the_same_data() {
    let dir = TempDir::new().unwrap();
    let writer = BlobCache::open(dir.path()).expect("open writer");
    let reader = BlobCache::open(dir.path()).expect("open reader");

    writer
        .write("shared", "data:image/png;base64,FFFF", Some("shared"), None)
        .expect("write");
    let got = reader.read("shared").expect("read").expect("present");
    assert_eq!(got.url, "data:image/png;base64,FFFF");
}

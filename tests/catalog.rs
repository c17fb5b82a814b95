//! Catalog Store Integration Tests
//!
//! Duplicate handling, cascade deletion, and persistence across
//! database reopens, all against an on-disk database.

use libris::core::{CatalogStore, StoreError};
use libris::domain::{Book, BookId, Bookmark, Locator};
use tempfile::TempDir;

fn book(href: &str, identifier: &str, title: &str) -> Book {
    Book::new(href, title, "Jane Author", identifier, None)
}

fn locator_at(progression: f64) -> Locator {
    Locator::new("chapter-1.xhtml", "application/xhtml+xml").with_total_progression(progression)
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("catalog.db");

    let first_id;
    {
        let store = CatalogStore::open(&db).unwrap();
        first_id = store
            .insert_book(&book("a.epub", "id-a", "Alpha"), false)
            .unwrap();
        store
            .insert_book(&book("b.epub", "id-b", "Beta"), false)
            .unwrap();
        store
            .insert_bookmark(&Bookmark::new(first_id, locator_at(0.125)))
            .unwrap();
    }

    let store = CatalogStore::open(&db).unwrap();
    let books = store.list_books().unwrap();
    assert_eq!(books.len(), 2);
    // Most recently added first.
    assert_eq!(books[0].href, "b.epub");
    assert_eq!(books[1].href, "a.epub");

    let bookmarks = store.bookmarks_for_book(first_id).unwrap();
    assert_eq!(bookmarks.len(), 1);
    // The progression comes back exactly as stored.
    assert_eq!(bookmarks[0].progression, Some(0.125));
    assert_eq!(bookmarks[0].locator.href, "chapter-1.xhtml");
}

#[test]
fn test_duplicate_rejected_then_kept_on_request() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();

    store
        .insert_book(&book("a.epub", "id-a", "Alpha"), false)
        .unwrap();

    // Same identifier under a new file name.
    let incoming = book("a-copy.epub", "id-a", "Alpha");
    let err = store.insert_book(&incoming, false).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));
    assert_eq!(
        store.list_books().unwrap().len(),
        1,
        "a failed insert must not write"
    );

    // The caller resolved the conflict: keep both.
    store.insert_book(&incoming, true).unwrap();
    assert_eq!(store.list_books().unwrap().len(), 2);
}

#[test]
fn test_duplicate_detected_by_source_alone() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();

    store
        .insert_book(&book("shared.epub", "id-a", "Alpha"), false)
        .unwrap();

    // Different identifier, same file.
    let err = store
        .insert_book(&book("shared.epub", "id-b", "Beta"), false)
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate));
}

#[test]
fn test_remove_cascades_to_bookmarks() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("catalog.db");
    let store = CatalogStore::open(&db).unwrap();

    let id = store
        .insert_book(&book("a.epub", "id-a", "Alpha"), false)
        .unwrap();
    store
        .insert_bookmark(&Bookmark::new(id, locator_at(0.25)))
        .unwrap();
    store
        .insert_bookmark(&Bookmark::new(id, locator_at(0.75)))
        .unwrap();

    assert!(store.delete_book(id).unwrap());
    assert!(store.bookmarks_for_book(id).unwrap().is_empty());
    assert!(!store.delete_book(id).unwrap(), "second delete is a no-op");

    // The cascade is durable, not a cache effect.
    drop(store);
    let reopened = CatalogStore::open(&db).unwrap();
    assert!(reopened.list_books().unwrap().is_empty());
    assert!(reopened.bookmarks_for_book(id).unwrap().is_empty());
}

#[test]
fn test_progression_bounds() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();
    let id = store
        .insert_book(&book("a.epub", "id-a", "Alpha"), false)
        .unwrap();

    // Both endpoints are valid positions.
    store
        .insert_bookmark(&Bookmark::new(id, locator_at(0.0)))
        .unwrap();
    store
        .insert_bookmark(&Bookmark::new(id, locator_at(1.0)))
        .unwrap();

    for out_of_range in [-0.01, 1.01] {
        let err = store
            .insert_bookmark(&Bookmark::new(id, locator_at(out_of_range)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    assert_eq!(store.bookmarks_for_book(id).unwrap().len(), 2);
}

#[test]
fn test_bookmark_requires_existing_book() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();

    let err = store
        .insert_bookmark(&Bookmark::new(BookId(404), locator_at(0.5)))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingBook(BookId(404))));
}

#[test]
fn test_full_locator_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();
    let id = store
        .insert_book(&book("a.epub", "id-a", "Alpha"), false)
        .unwrap();

    let mut locator = Locator::new("ch-9.xhtml", "application/xhtml+xml")
        .with_title("Chapter 9")
        .with_progression(0.6)
        .with_total_progression(0.55);
    locator.locations.fragments = vec!["sec-2".to_string()];
    locator.locations.position = Some(12);

    store
        .insert_bookmark(&Bookmark::new(id, locator.clone()))
        .unwrap();

    let stored = store.bookmarks_for_book(id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].locator, locator);
    assert_eq!(stored[0].progression, Some(0.55));
}

#[test]
fn test_bookmarks_listed_in_reading_order() {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::open(&dir.path().join("catalog.db")).unwrap();
    let id = store
        .insert_book(&book("a.epub", "id-a", "Alpha"), false)
        .unwrap();

    // Inserted out of order, with one position-less bookmark.
    for progression in [Some(0.9), Some(0.1), None, Some(0.4)] {
        let mut locator = Locator::new("ch.xhtml", "application/xhtml+xml");
        locator.locations.total_progression = progression;
        store
            .insert_bookmark(&Bookmark::new(id, locator))
            .unwrap();
    }

    let progressions: Vec<Option<f64>> = store
        .bookmarks_for_book(id)
        .unwrap()
        .into_iter()
        .map(|b| b.progression)
        .collect();
    assert_eq!(
        progressions,
        vec![Some(0.1), Some(0.4), Some(0.9), None],
        "ascending by position, unknown positions last"
    );
}

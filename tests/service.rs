//! Library Service Integration Tests
//!
//! Event broadcasting, sample preloading, and the read path, exercised
//! through the service facade with a content-derived test opener.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;

use libris::adapters::{PublicationMeta, PublicationOpener};
use libris::core::CatalogStore;
use libris::domain::{BookId, LibraryEvent, Locator};
use libris::ingest::{DiscardDuplicates, FileStorage, ImportOutcome};
use libris::library::{LibraryService, OpenError};

/// Opener that derives metadata from file contents, so identity is
/// stable across staging renames. Empty files fail to open, which lets
/// tests script failures. Tracks how many opens run concurrently.
struct ContentOpener {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ContentOpener {
    fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PublicationOpener for ContentOpener {
    async fn open(&self, path: &Path) -> Result<PublicationMeta> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let contents = tokio::fs::read_to_string(path).await?;
        let title = contents.trim().to_string();
        if title.is_empty() {
            anyhow::bail!("empty publication");
        }
        Ok(PublicationMeta {
            title: title.clone(),
            authors: vec![],
            identifier: Some(format!("urn:test:{}", title)),
            cover: None,
        })
    }
}

struct Harness {
    dir: TempDir,
    home: PathBuf,
    samples: PathBuf,
    storage: Arc<FileStorage>,
    opener: Arc<ContentOpener>,
    service: LibraryService,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let home = dir.path().join("home");
    let samples = dir.path().join("samples");
    tokio::fs::create_dir_all(&home).await.unwrap();
    tokio::fs::create_dir_all(&samples).await.unwrap();

    let store = Arc::new(CatalogStore::open_in_memory().unwrap());
    let storage = Arc::new(FileStorage::open(dir.path().join("books")).await.unwrap());
    let opener = Arc::new(ContentOpener::new());

    let service = LibraryService::new(
        Arc::clone(&store),
        Arc::clone(&storage),
        Arc::clone(&opener) as Arc<dyn PublicationOpener>,
        Arc::new(DiscardDuplicates),
    );

    Harness {
        dir,
        home,
        samples,
        storage,
        opener,
        service,
    }
}

impl Harness {
    /// Write a sample whose title and identifier are its contents.
    async fn write_sample(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.samples.join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    fn marker(&self) -> PathBuf {
        self.home.join("samples_version")
    }
}

fn drain(rx: &mut broadcast::Receiver<LibraryEvent>) -> Vec<LibraryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_events_trace_import_outcomes() {
    let h = harness().await;
    let mut rx = h.service.subscribe();

    // A fresh import announces the new entry.
    let source = h.write_sample("alpha.epub", "Alpha").await;
    let outcome = h.service.import_file(&source).await.unwrap();
    let ImportOutcome::Added(book_id) = outcome else {
        panic!("expected an added entry");
    };
    assert_eq!(drain(&mut rx), vec![LibraryEvent::EntryAdded { book_id }]);

    // Re-importing announces the collision, then the cancellation.
    let outcome = h.service.import_file(&source).await.unwrap();
    assert_eq!(outcome, ImportOutcome::Cancelled);
    assert_eq!(
        drain(&mut rx),
        vec![
            LibraryEvent::DuplicateDetected {
                title: "Alpha".to_string()
            },
            LibraryEvent::ImportCancelled,
        ]
    );

    // A failed import announces the failure.
    let bad = h.write_sample("bad.epub", "").await;
    h.service.import_file(&bad).await.unwrap_err();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], LibraryEvent::ImportFailed { .. }));

    // Removing announces the removal.
    assert!(h.service.remove(book_id).await.unwrap());
    assert_eq!(drain(&mut rx), vec![LibraryEvent::EntryRemoved { book_id }]);
}

#[tokio::test]
async fn test_remove_deletes_managed_file() {
    let h = harness().await;

    let source = h.write_sample("alpha.epub", "Alpha").await;
    let ImportOutcome::Added(book_id) = h.service.import_file(&source).await.unwrap() else {
        panic!("expected an added entry");
    };

    let book = h.service.get(book_id).unwrap().unwrap();
    let managed = h.storage.path_of(&book.href);
    assert!(managed.exists());

    assert!(h.service.remove(book_id).await.unwrap());
    assert!(!managed.exists());
    assert!(h.service.list().unwrap().is_empty());

    // Removing again reports absence.
    assert!(!h.service.remove(book_id).await.unwrap());
}

#[tokio::test]
async fn test_open_for_reading_round_trip() {
    let h = harness().await;

    let source = h.write_sample("alpha.epub", "Alpha").await;
    let ImportOutcome::Added(book_id) = h.service.import_file(&source).await.unwrap() else {
        panic!("expected an added entry");
    };

    let meta = h.service.open_for_reading(book_id).await.unwrap();
    assert_eq!(meta.title, "Alpha");

    h.service.remove(book_id).await.unwrap();
    let err = h.service.open_for_reading(book_id).await.unwrap_err();
    assert!(matches!(err, OpenError::NotFound(id) if id == book_id));
}

#[tokio::test]
async fn test_bookmarks_through_the_service() {
    let h = harness().await;

    let source = h.write_sample("alpha.epub", "Alpha").await;
    let ImportOutcome::Added(book_id) = h.service.import_file(&source).await.unwrap() else {
        panic!("expected an added entry");
    };

    let locator =
        Locator::new("ch-2.xhtml", "application/xhtml+xml").with_total_progression(0.37);
    let bookmark_id = h.service.add_bookmark(book_id, locator).unwrap();

    let bookmarks = h.service.bookmarks(book_id).unwrap();
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].progression, Some(0.37));

    assert!(h.service.delete_bookmark(bookmark_id).unwrap());
    assert!(!h.service.delete_bookmark(bookmark_id).unwrap());
    assert!(h.service.bookmarks(book_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_preload_runs_sequentially_in_name_order() {
    let h = harness().await;

    // Created out of name order on purpose.
    h.write_sample("c.epub", "Gamma").await;
    h.write_sample("a.epub", "Alpha").await;
    h.write_sample("b.epub", "Beta").await;

    let summary = h.service.preload_samples(&h.samples).await.unwrap();
    assert_eq!(summary.added, 3);
    assert_eq!(summary.cancelled, 0);
    assert_eq!(summary.failed, 0);

    // Never more than one import in flight.
    assert_eq!(h.opener.max_active.load(Ordering::SeqCst), 1);

    // Most recent first means reverse name order.
    let titles: Vec<String> = h
        .service
        .list()
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["Gamma", "Beta", "Alpha"]);
}

#[tokio::test]
async fn test_preload_continues_past_failures_and_duplicates() {
    let h = harness().await;

    h.write_sample("a.epub", "Alpha").await;
    h.write_sample("bad.epub", "").await;
    h.write_sample("dup-1.epub", "Dup").await;
    h.write_sample("dup-2.epub", "Dup").await;

    let summary = h.service.preload_samples(&h.samples).await.unwrap();
    assert_eq!(summary.added, 2, "Alpha and the first Dup");
    assert_eq!(summary.failed, 1, "the empty sample");
    assert_eq!(summary.cancelled, 1, "the second Dup was discarded");

    assert_eq!(h.service.list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_preload_once_respects_marker() {
    let h = harness().await;
    h.write_sample("a.epub", "Alpha").await;

    let first = h
        .service
        .preload_samples_once(&h.samples, &h.marker())
        .await
        .unwrap();
    assert_eq!(first.map(|s| s.added), Some(1));
    assert!(h.marker().exists());

    // Second run is skipped entirely, even with new samples present.
    h.write_sample("b.epub", "Beta").await;
    let second = h
        .service
        .preload_samples_once(&h.samples, &h.marker())
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(h.service.list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_import_from_remote_href_cannot_open_locally() {
    let h = harness().await;

    // Seed an entry whose href is a URL rather than a managed file.
    let store = CatalogStore::open_in_memory().unwrap();
    let storage = Arc::new(
        FileStorage::open(h.dir.path().join("books-remote"))
            .await
            .unwrap(),
    );
    let book = libris::domain::Book::new(
        "https://example.org/book.epub",
        "Remote",
        "",
        "urn:remote",
        None,
    );
    let book_id = store.insert_book(&book, false).unwrap();

    let service = LibraryService::new(
        Arc::new(store),
        storage,
        Arc::new(ContentOpener::new()) as Arc<dyn PublicationOpener>,
        Arc::new(DiscardDuplicates),
    );

    let err = service.open_for_reading(book_id).await.unwrap_err();
    assert!(matches!(err, OpenError::OpenFailed(_)));
}

#[tokio::test]
async fn test_unread_observer_does_not_block_imports() {
    let h = harness().await;

    // Subscribe and never read; the channel must absorb or drop events
    // without stalling imports.
    let _rx = h.service.subscribe();

    for i in 0..5 {
        let source = h
            .write_sample(&format!("s{}.epub", i), &format!("Book {}", i))
            .await;
        let outcome = h.service.import_file(&source).await.unwrap();
        assert!(matches!(outcome, ImportOutcome::Added(_)));
    }

    assert_eq!(h.service.list().unwrap().len(), 5);
}

// SQLite row ids start at 1, so id 0 is always a clean miss.
#[tokio::test]
async fn test_get_unknown_book_is_none() {
    let h = harness().await;
    assert!(h.service.get(BookId(0)).unwrap().is_none());
}

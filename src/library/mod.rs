//! Catalog service facade.
//!
//! One object the CLI (or any other front end) talks to: it wires the
//! store, managed storage, and the import pipeline together, and
//! broadcasts catalog events to observers.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.libris/
//! ├── catalog.db          # books + bookmarks (SQLite)
//! ├── samples_version     # marker written after sample preloading
//! └── books/
//!     └── <file>          # one managed file per catalog entry
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::adapters::{
    DownloadRequest, Downloader, ProtectionHandler, PublicationMeta, PublicationOpener,
};
use crate::core::{CatalogStore, StoreError};
use crate::domain::{Book, BookId, Bookmark, BookmarkId, LibraryEvent, Locator};
use crate::ingest::pipeline::{
    DuplicateDecision, DuplicateResolver, ImportError, ImportOutcome, Importer,
};
use crate::ingest::storage::FileStorage;

/// Capacity of the event channel; slow observers lose the oldest events.
const EVENT_CAPACITY: usize = 64;

/// Current sample-set revision. Bump to re-run preloading for existing
/// installations.
pub const SAMPLES_VERSION: u32 = 1;

/// Errors from opening a cataloged publication for reading.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The catalog has no such book.
    #[error("no book with id {0} in the catalog")]
    NotFound(BookId),

    /// The catalog lookup itself failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The entry exists but its publication could not be opened.
    #[error("publication could not be opened: {0}")]
    OpenFailed(#[source] anyhow::Error),
}

/// Outcome tally of a sample preload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    /// Entries added to the catalog.
    pub added: usize,

    /// Imports that ended in cancellation (discarded duplicates included).
    pub cancelled: usize,

    /// Imports that failed.
    pub failed: usize,
}

/// Facade over the catalog store, managed storage, and import pipeline.
pub struct LibraryService {
    store: Arc<CatalogStore>,
    storage: Arc<FileStorage>,
    opener: Arc<dyn PublicationOpener>,
    importer: Importer,
    events: broadcast::Sender<LibraryEvent>,
}

impl LibraryService {
    /// Wire a service from its parts. The resolver decides what happens
    /// to duplicate imports; protection handlers and a downloader are
    /// added with the builder methods.
    pub fn new(
        store: Arc<CatalogStore>,
        storage: Arc<FileStorage>,
        opener: Arc<dyn PublicationOpener>,
        resolver: Arc<dyn DuplicateResolver>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        // Duplicates are announced the moment the pipeline detects
        // them, before the resolver decides the import's fate.
        let notifying = Arc::new(NotifyingResolver {
            inner: resolver,
            events: events.clone(),
        });

        let importer = Importer::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            Arc::clone(&opener),
            notifying,
        );

        Self {
            store,
            storage,
            opener,
            importer,
            events,
        }
    }

    /// Register a protection handler for imports.
    pub fn with_protection(mut self, handler: Arc<dyn ProtectionHandler>) -> Self {
        self.importer = self.importer.with_protection(handler);
        self
    }

    /// Attach a downloader for URL imports.
    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.importer = self.importer.with_downloader(downloader);
        self
    }

    /// Subscribe to catalog events. Each observer gets an independent
    /// receiver; events sent before subscription are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Import a publication from a local file, announcing the outcome.
    pub async fn import_file(&self, source: &Path) -> Result<ImportOutcome, ImportError> {
        self.announce(self.importer.import_file(source).await)
    }

    /// Import a publication from a remote URL, announcing the outcome.
    pub async fn import_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<ImportOutcome, ImportError> {
        self.announce(self.importer.import_download(request).await)
    }

    /// Remove a book, its bookmarks, and its managed file. Returns
    /// whether the catalog contained the book.
    pub async fn remove(&self, book_id: BookId) -> Result<bool, StoreError> {
        let Some(book) = self.store.get_book(book_id)? else {
            return Ok(false);
        };

        // The catalog row is authoritative; it goes first, and file
        // cleanup afterwards is best-effort.
        let removed = self.store.delete_book(book_id)?;

        if let Some(file_name) = book.file_name() {
            if let Err(e) = self.storage.remove(file_name).await {
                warn!(book_id = %book_id, error = %e, "Failed to remove publication file");
            }
        }

        if removed {
            self.emit(LibraryEvent::EntryRemoved { book_id });
        }
        Ok(removed)
    }

    /// All books, most recently added first.
    pub fn list(&self) -> Result<Vec<Book>, StoreError> {
        self.store.list_books()
    }

    /// Fetch one book.
    pub fn get(&self, book_id: BookId) -> Result<Option<Book>, StoreError> {
        self.store.get_book(book_id)
    }

    /// Open a cataloged publication for reading: look up the entry,
    /// resolve its managed file, and parse it.
    pub async fn open_for_reading(&self, book_id: BookId) -> Result<PublicationMeta, OpenError> {
        let book = self
            .store
            .get_book(book_id)?
            .ok_or(OpenError::NotFound(book_id))?;

        let file_name = book.file_name().ok_or_else(|| {
            OpenError::OpenFailed(anyhow::anyhow!(
                "book {} references a remote source: {}",
                book_id,
                book.href
            ))
        })?;
        let path = self.storage.path_of(file_name);

        self.opener
            .open(&path)
            .await
            .map_err(OpenError::OpenFailed)
    }

    /// Bookmarks of a book, ordered by position within the publication.
    pub fn bookmarks(&self, book_id: BookId) -> Result<Vec<Bookmark>, StoreError> {
        self.store.bookmarks_for_book(book_id)
    }

    /// Save a reading position for a book.
    pub fn add_bookmark(
        &self,
        book_id: BookId,
        locator: Locator,
    ) -> Result<BookmarkId, StoreError> {
        self.store.insert_bookmark(&Bookmark::new(book_id, locator))
    }

    /// Delete one bookmark. Returns whether it existed.
    pub fn delete_bookmark(&self, bookmark_id: BookmarkId) -> Result<bool, StoreError> {
        self.store.delete_bookmark(bookmark_id)
    }

    /// Import every file in `dir`, one at a time in name order. A
    /// failed or cancelled sample never stops the rest.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn preload_samples(&self, dir: &Path) -> anyhow::Result<PreloadSummary> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read samples directory {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut summary = PreloadSummary::default();
        for path in paths {
            match self.import_file(&path).await {
                Ok(ImportOutcome::Added(_)) => summary.added += 1,
                Ok(ImportOutcome::Cancelled) => summary.cancelled += 1,
                Err(e) => {
                    warn!(sample = %path.display(), error = %e, "Sample import failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            added = summary.added,
            cancelled = summary.cancelled,
            failed = summary.failed,
            "Sample preload finished"
        );
        Ok(summary)
    }

    /// Run [`LibraryService::preload_samples`] only when the marker
    /// file records an older sample-set revision, then update the
    /// marker. Returns `None` when preloading was skipped.
    pub async fn preload_samples_once(
        &self,
        dir: &Path,
        marker: &Path,
    ) -> anyhow::Result<Option<PreloadSummary>> {
        let seen: Option<u32> = match tokio::fs::read_to_string(marker).await {
            Ok(contents) => contents.trim().parse().ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read samples marker {}", marker.display()))
            }
        };
        if seen.unwrap_or(0) >= SAMPLES_VERSION {
            return Ok(None);
        }

        let summary = self.preload_samples(dir).await?;

        if let Some(parent) = marker.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(marker, SAMPLES_VERSION.to_string())
            .await
            .with_context(|| format!("Failed to write samples marker {}", marker.display()))?;

        Ok(Some(summary))
    }

    fn announce(
        &self,
        outcome: Result<ImportOutcome, ImportError>,
    ) -> Result<ImportOutcome, ImportError> {
        match &outcome {
            Ok(ImportOutcome::Added(book_id)) => {
                self.emit(LibraryEvent::EntryAdded { book_id: *book_id })
            }
            Ok(ImportOutcome::Cancelled) => self.emit(LibraryEvent::ImportCancelled),
            Err(e) => self.emit(LibraryEvent::ImportFailed {
                reason: e.to_string(),
            }),
        }
        outcome
    }

    fn emit(&self, event: LibraryEvent) {
        // Ignore send errors (no observer may be listening)
        let _ = self.events.send(event);
    }
}

/// Resolver wrapper that announces the collision before delegating.
struct NotifyingResolver {
    inner: Arc<dyn DuplicateResolver>,
    events: broadcast::Sender<LibraryEvent>,
}

#[async_trait]
impl DuplicateResolver for NotifyingResolver {
    async fn resolve(&self, book: &Book) -> DuplicateDecision {
        // Ignore send errors (no observer may be listening)
        let _ = self.events.send(LibraryEvent::DuplicateDetected {
            title: book.title.clone(),
        });
        self.inner.resolve(book).await
    }
}

//! Import state machine.
//!
//! An import walks a publication through fixed stages:
//!
//! ```text
//! staged → protection check → fulfilled → parsed → cataloged
//! ```
//!
//! Two exit rules hold at every stage:
//! - cancellation (by the user or a handler) is a success that leaves
//!   no trace, not an error;
//! - a failure discards whatever files the attempt created before the
//!   error surfaces, so storage never keeps half-imported artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{
    Acquisition, DownloadRequest, Downloader, ProtectionHandler, PublicationOpener,
};
use crate::core::{CatalogStore, StoreError};
use crate::domain::{Book, BookId};
use crate::ingest::storage::FileStorage;

/// Errors produced by a failed import, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The source could not be staged or downloaded.
    #[error("failed to import publication: {0}")]
    ImportFailed(#[source] anyhow::Error),

    /// A protection handler recognized the file but could not fulfill it.
    #[error("failed to fulfill protected publication: {0}")]
    FulfillmentFailed(#[source] anyhow::Error),

    /// The file was acquired but could not be parsed as a publication.
    #[error("failed to open publication: {0}")]
    OpenFailed(#[source] anyhow::Error),

    /// The catalog rejected the entry.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Terminal state of a successful import call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A catalog entry was created.
    Added(BookId),

    /// The user backed out; catalog and storage are unchanged.
    Cancelled,
}

/// What to do with an import whose book is already in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDecision {
    /// Insert a second entry anyway.
    Keep,

    /// Drop the import and its file.
    Discard,
}

/// Decides what happens when an import collides with an existing entry.
#[async_trait]
pub trait DuplicateResolver: Send + Sync {
    /// Choose a decision for the colliding book.
    async fn resolve(&self, book: &Book) -> DuplicateDecision;
}

/// Resolver that always keeps duplicates
#[derive(Debug, Default)]
pub struct KeepDuplicates;

#[async_trait]
impl DuplicateResolver for KeepDuplicates {
    async fn resolve(&self, _book: &Book) -> DuplicateDecision {
        DuplicateDecision::Keep
    }
}

/// Resolver that always discards duplicates
#[derive(Debug, Default)]
pub struct DiscardDuplicates;

#[async_trait]
impl DuplicateResolver for DiscardDuplicates {
    async fn resolve(&self, _book: &Book) -> DuplicateDecision {
        DuplicateDecision::Discard
    }
}

/// Drives files and downloads through the import stages.
pub struct Importer {
    store: Arc<CatalogStore>,
    storage: Arc<FileStorage>,
    protections: Vec<Arc<dyn ProtectionHandler>>,
    opener: Arc<dyn PublicationOpener>,
    resolver: Arc<dyn DuplicateResolver>,
    downloader: Option<Arc<dyn Downloader>>,
}

impl Importer {
    /// Create an importer with no protection handlers and no downloader.
    pub fn new(
        store: Arc<CatalogStore>,
        storage: Arc<FileStorage>,
        opener: Arc<dyn PublicationOpener>,
        resolver: Arc<dyn DuplicateResolver>,
    ) -> Self {
        Self {
            store,
            storage,
            protections: Vec::new(),
            opener,
            resolver,
            downloader: None,
        }
    }

    /// Register a protection handler. Handlers are consulted in
    /// registration order; the first whose `can_fulfill` matches wins.
    pub fn with_protection(mut self, handler: Arc<dyn ProtectionHandler>) -> Self {
        self.protections.push(handler);
        self
    }

    /// Attach a downloader for URL imports.
    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Import a publication from a local file. The source is copied
    /// into managed storage, never moved or deleted.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub async fn import_file(&self, source: &Path) -> Result<ImportOutcome, ImportError> {
        let staged = self
            .storage
            .stage(source)
            .await
            .map_err(ImportError::ImportFailed)?;
        self.import_staged(staged).await
    }

    /// Import a publication from a remote source. The downloaded file
    /// is deleted after the attempt, whatever the outcome.
    #[instrument(skip(self), fields(url = %request.url))]
    pub async fn import_download(
        &self,
        request: &DownloadRequest,
    ) -> Result<ImportOutcome, ImportError> {
        let downloader = self.downloader.as_ref().ok_or_else(|| {
            ImportError::ImportFailed(anyhow::anyhow!("no downloader configured"))
        })?;

        let downloaded = match downloader
            .fetch(request)
            .await
            .map_err(ImportError::ImportFailed)?
        {
            Acquisition::Acquired(file) => file,
            Acquisition::Cancelled => {
                info!("Download cancelled");
                return Ok(ImportOutcome::Cancelled);
            }
        };

        // Servers rarely get the file name right; the media type is
        // authoritative for picking the extension the protection
        // handlers will match on.
        let local =
            correct_extension(&downloaded.local_path, downloaded.media_type.as_deref()).await;

        let outcome = self.import_file(&local).await;

        // The download is a transient artifact outside managed storage.
        if let Err(e) = tokio::fs::remove_file(&local).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %local.display(), error = %e, "Failed to remove downloaded file");
            }
        }

        outcome
    }

    /// Run an already-staged file through the remaining stages.
    async fn import_staged(&self, staged: PathBuf) -> Result<ImportOutcome, ImportError> {
        let final_path = match self.protection_for(&staged) {
            Some(handler) => {
                debug!(handler = handler.name(), "Fulfilling protected publication");
                let fulfilled = handler.fulfill(&staged).await;

                // Once the handler has run, the staged license or
                // protected file is an intermediate artifact either way.
                self.storage.discard(&staged).await;

                match fulfilled {
                    Ok(Acquisition::Acquired(file)) => {
                        match self
                            .storage
                            .promote(&file.local_path, &file.suggested_filename)
                            .await
                        {
                            Ok(path) => path,
                            Err(e) => {
                                self.storage.discard(&file.local_path).await;
                                return Err(ImportError::FulfillmentFailed(e));
                            }
                        }
                    }
                    Ok(Acquisition::Cancelled) => {
                        info!("Fulfillment cancelled");
                        return Ok(ImportOutcome::Cancelled);
                    }
                    Err(e) => return Err(ImportError::FulfillmentFailed(e)),
                }
            }
            // Unprotected files keep their staged name.
            None => staged,
        };

        self.catalog(final_path).await
    }

    fn protection_for(&self, path: &Path) -> Option<&Arc<dyn ProtectionHandler>> {
        self.protections.iter().find(|h| h.can_fulfill(path))
    }

    /// Final stage: extract metadata and write the catalog entry. On
    /// any failure the managed file is removed before the error
    /// surfaces.
    async fn catalog(&self, path: PathBuf) -> Result<ImportOutcome, ImportError> {
        let meta = match self.opener.open(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                self.storage.discard(&path).await;
                return Err(ImportError::OpenFailed(e));
            }
        };

        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                self.storage.discard(&path).await;
                return Err(ImportError::ImportFailed(anyhow::anyhow!(
                    "managed file {} has no usable name",
                    path.display()
                )));
            }
        };

        let author = meta.author_line();
        let identifier = meta
            .identifier
            .clone()
            .unwrap_or_else(|| file_name.clone());
        let book = Book::new(&file_name, &meta.title, author, identifier, meta.cover);

        let book_id = match self.store.insert_book(&book, false) {
            Ok(id) => id,
            Err(StoreError::Duplicate) => match self.resolver.resolve(&book).await {
                DuplicateDecision::Keep => match self.store.insert_book(&book, true) {
                    Ok(id) => id,
                    Err(e) => {
                        self.storage.discard(&path).await;
                        return Err(ImportError::Storage(e));
                    }
                },
                DuplicateDecision::Discard => {
                    info!(title = %book.title, "Duplicate discarded");
                    self.storage.discard(&path).await;
                    return Ok(ImportOutcome::Cancelled);
                }
            },
            Err(e) => {
                self.storage.discard(&path).await;
                return Err(ImportError::Storage(e));
            }
        };

        info!(book_id = %book_id, title = %book.title, "Publication cataloged");
        Ok(ImportOutcome::Added(book_id))
    }
}

async fn correct_extension(path: &Path, media_type: Option<&str>) -> PathBuf {
    let Some(extension) = media_type.and_then(extension_for_media_type) else {
        return path.to_path_buf();
    };
    if path.extension().and_then(|e| e.to_str()) == Some(extension) {
        return path.to_path_buf();
    }

    let renamed = path.with_extension(extension);
    match tokio::fs::rename(path, &renamed).await {
        Ok(()) => renamed,
        Err(e) => {
            warn!(error = %e, "Could not align downloaded file extension; keeping original");
            path.to_path_buf()
        }
    }
}

/// Extensions for the publication media types the pipeline recognizes.
fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    match media_type {
        "application/epub+zip" => Some("epub"),
        "application/pdf" => Some("pdf"),
        "application/audiobook+zip" => Some("audiobook"),
        "application/webpub+zip" => Some("webpub"),
        "application/divina+zip" => Some("divina"),
        "application/vnd.comicbook+zip" | "application/x-cbz" => Some("cbz"),
        "application/vnd.readium.lcp.license.v1.0+json" => Some("lcpl"),
        _ => None,
    }
}

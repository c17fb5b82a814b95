//! Adapter interfaces for external systems.
//!
//! Adapters isolate the catalog from everything it does not own:
//! protection (DRM) fulfillment tools, publication parsers, and remote
//! acquisition backends.

pub mod filename;
pub mod http;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

// Re-export the bundled adapters
pub use filename::FilenameOpener;
pub use http::HttpDownloader;

/// Result of an acquisition step the user may abort midway.
///
/// Cancellation is not an error: a cancelled acquisition produced no
/// artifact and asks for no recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition<T> {
    /// The step ran to completion and produced an artifact.
    Acquired(T),

    /// The user backed out; nothing was produced.
    Cancelled,
}

/// A publication produced by fulfilling a protected license file.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfilledFile {
    /// Where the fulfillment tool left the publication.
    pub local_path: PathBuf,

    /// File name the publication should be cataloged under.
    pub suggested_filename: String,
}

/// Bibliographic data extracted from a publication.
#[derive(Debug, Clone, Default)]
pub struct PublicationMeta {
    /// Title, never empty (openers fall back to the file name).
    pub title: String,

    /// Contributing authors, possibly empty.
    pub authors: Vec<String>,

    /// Canonical identifier (ISBN, urn:uuid, ...) when the format carries one.
    pub identifier: Option<String>,

    /// Raw cover image bytes, when the publication embeds one.
    pub cover: Option<Vec<u8>>,
}

impl PublicationMeta {
    /// All authors joined into one display line.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}

/// A remote publication to acquire.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,

    /// Title to show while the transfer is in flight, when known.
    pub title_hint: Option<String>,
}

impl DownloadRequest {
    /// Create a request for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title_hint: None,
        }
    }

    /// Attach a display title for progress reporting.
    pub fn with_title_hint(mut self, title: impl Into<String>) -> Self {
        self.title_hint = Some(title.into());
        self
    }
}

/// A file retrieved from a remote source.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Temporary local copy of the remote file.
    pub local_path: PathBuf,

    /// Media type reported by the source, when it sent one.
    pub media_type: Option<String>,
}

/// Trait for protection (DRM) fulfillment tools.
///
/// During ingestion the first handler whose `can_fulfill` matches the
/// staged file performs the fulfillment; later handlers are never
/// consulted.
#[async_trait]
pub trait ProtectionHandler: Send + Sync {
    /// Human-readable handler name
    fn name(&self) -> &str;

    /// Whether this handler recognizes the file as one of its license
    /// or protected formats.
    fn can_fulfill(&self, path: &Path) -> bool;

    /// Exchange the staged file for the publication it unlocks.
    async fn fulfill(&self, path: &Path) -> Result<Acquisition<FulfilledFile>>;
}

/// Trait for publication parsers.
#[async_trait]
pub trait PublicationOpener: Send + Sync {
    /// Parse the file and extract its bibliographic metadata.
    async fn open(&self, path: &Path) -> Result<PublicationMeta>;
}

/// Trait for remote acquisition backends.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Retrieve the remote publication into a temporary local file.
    async fn fetch(&self, request: &DownloadRequest) -> Result<Acquisition<DownloadedFile>>;
}

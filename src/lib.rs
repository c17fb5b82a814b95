//! libris - Publication catalog and ingestion pipeline
//!
//! A catalog for digital publications (EPUB, PDF, audiobooks, ...)
//! backed by SQLite, with an import pipeline that stages files into
//! managed storage, fulfills protected formats, and extracts metadata.
//!
//! # Architecture
//!
//! An import walks fixed stages, with two rules holding throughout:
//! - user cancellation is a success that leaves no trace
//! - any failure cleans up the files the attempt created
//!
//! # Modules
//!
//! - `adapters`: External system seams (protection, parsing, download)
//! - `core`: Persistence (CatalogStore)
//! - `domain`: Data structures (Book, Bookmark, Locator, events)
//! - `ingest`: Import pipeline and managed storage
//! - `library`: Service facade tying it all together
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import a publication
//! libris import fable.epub
//!
//! # List the catalog
//! libris list
//!
//! # Save a reading position
//! libris bookmark 1 chapter-3.xhtml --progression 0.42
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod library;

// Re-export main types at crate root for convenience
pub use crate::core::{CatalogStore, StoreError};
pub use domain::{Book, BookId, Bookmark, BookmarkId, LibraryEvent, Locations, Locator};
pub use ingest::{FileStorage, ImportError, ImportOutcome, Importer};
pub use library::{LibraryService, OpenError, PreloadSummary};

// Adapter seams
pub use adapters::{
    Acquisition, DownloadRequest, DownloadedFile, Downloader, FulfilledFile, ProtectionHandler,
    PublicationMeta, PublicationOpener,
};

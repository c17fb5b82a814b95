//! Command-line interface for libris.
//!
//! Provides commands for importing publications from files and URLs,
//! listing and removing catalog entries, managing bookmarks, and
//! preloading the bundled samples.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{DownloadRequest, FilenameOpener, HttpDownloader};
use crate::config;
use crate::core::CatalogStore;
use crate::domain::{BookId, BookmarkId, Locator};
use crate::ingest::pipeline::{
    DiscardDuplicates, DuplicateResolver, ImportOutcome, KeepDuplicates,
};
use crate::ingest::storage::FileStorage;
use crate::library::LibraryService;

/// libris - Publication catalog and ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "libris")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import publications from local files
    Import {
        /// Files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Insert even when the catalog already has the publication
        #[arg(long)]
        allow_duplicate: bool,
    },

    /// Download and import a publication from a URL
    Fetch {
        /// URL to download
        url: String,

        /// Title to record for the transfer
        #[arg(short, long)]
        title: Option<String>,

        /// Insert even when the catalog already has the publication
        #[arg(long)]
        allow_duplicate: bool,
    },

    /// List cataloged publications
    List {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show details of one publication
    Show {
        /// Book ID
        book_id: i64,
    },

    /// Remove a publication, its bookmarks, and its file
    Remove {
        /// Book ID to remove
        book_id: i64,
    },

    /// Save a reading position in a publication
    Bookmark {
        /// Book ID
        book_id: i64,

        /// Resource within the publication (e.g. a chapter href)
        href: String,

        /// Overall position in the publication, between 0 and 1
        #[arg(short, long)]
        progression: Option<f64>,

        /// Media type of the resource
        #[arg(long, default_value = "application/xhtml+xml")]
        media_type: String,
    },

    /// List the bookmarks of a publication
    Bookmarks {
        /// Book ID
        book_id: i64,
    },

    /// Delete a bookmark
    Unbookmark {
        /// Bookmark ID to delete
        bookmark_id: i64,
    },

    /// Preload the bundled sample publications
    Samples {
        /// Directory of samples (defaults to the configured path)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Preload even when this sample set was already loaded
        #[arg(long)]
        force: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Import {
                files,
                allow_duplicate,
            } => import_files(files, allow_duplicate).await,
            Commands::Fetch {
                url,
                title,
                allow_duplicate,
            } => fetch_url(&url, title, allow_duplicate).await,
            Commands::List { limit } => list_catalog(limit).await,
            Commands::Show { book_id } => show_book(BookId(book_id)).await,
            Commands::Remove { book_id } => remove_book(BookId(book_id)).await,
            Commands::Bookmark {
                book_id,
                href,
                progression,
                media_type,
            } => add_bookmark(BookId(book_id), &href, progression, &media_type).await,
            Commands::Bookmarks { book_id } => list_bookmarks(BookId(book_id)).await,
            Commands::Unbookmark { bookmark_id } => {
                delete_bookmark(BookmarkId(bookmark_id)).await
            }
            Commands::Samples { dir, force } => preload_samples(dir, force).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Build the library service from the resolved configuration
async fn open_service(allow_duplicate: bool) -> Result<LibraryService> {
    let cfg = config::config()?;

    let store = Arc::new(CatalogStore::open(&cfg.db_path())?);
    let storage = Arc::new(FileStorage::open(&cfg.storage).await?);

    // Without an interactive prompt, the duplicate policy is decided
    // up front by the --allow-duplicate flag.
    let resolver: Arc<dyn DuplicateResolver> = if allow_duplicate {
        Arc::new(KeepDuplicates)
    } else {
        Arc::new(DiscardDuplicates)
    };

    let service = LibraryService::new(store, storage, Arc::new(FilenameOpener::new()), resolver)
        .with_downloader(Arc::new(HttpDownloader::new()));

    Ok(service)
}

/// Import local files into the catalog
async fn import_files(files: Vec<PathBuf>, allow_duplicate: bool) -> Result<()> {
    let service = open_service(allow_duplicate).await?;

    let mut failures = 0;
    for file in &files {
        eprintln!("📥 Importing {}", file.display());
        match service.import_file(file).await {
            Ok(ImportOutcome::Added(book_id)) => {
                eprintln!("✅ Added as book {}", book_id);
            }
            Ok(ImportOutcome::Cancelled) => {
                eprintln!("🚫 Skipped (already in the catalog)");
            }
            Err(e) => {
                eprintln!("❌ Import failed: {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} imports failed", failures, files.len());
    }
    Ok(())
}

/// Download and import a publication from a URL
async fn fetch_url(url: &str, title: Option<String>, allow_duplicate: bool) -> Result<()> {
    let service = open_service(allow_duplicate).await?;

    let mut request = DownloadRequest::new(url);
    if let Some(title) = title {
        request = request.with_title_hint(title);
    }

    eprintln!("📥 Fetching {}", url);
    match service.import_download(&request).await {
        Ok(ImportOutcome::Added(book_id)) => {
            eprintln!("✅ Added as book {}", book_id);
            Ok(())
        }
        Ok(ImportOutcome::Cancelled) => {
            eprintln!("🚫 Skipped (already in the catalog)");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to import {}", url)),
    }
}

/// List cataloged publications
async fn list_catalog(limit: usize) -> Result<()> {
    let service = open_service(false).await?;
    let books = service.list()?;

    if books.is_empty() {
        println!("Catalog is empty. Use 'libris import <file>' to add publications.");
        return Ok(());
    }

    let total = books.len();
    println!("{:<6} {:<34} {:<24} {:<17}", "ID", "TITLE", "AUTHOR", "ADDED");
    println!("{}", "-".repeat(84));

    for book in books.iter().take(limit) {
        let id = book
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<34} {:<24} {:<17}",
            id,
            truncate(&book.title, 31),
            truncate(&book.author, 21),
            book.created.format("%Y-%m-%d %H:%M"),
        );
    }

    println!("\nTotal: {} publications", total);
    Ok(())
}

/// Show details of one catalog entry
async fn show_book(book_id: BookId) -> Result<()> {
    let service = open_service(false).await?;

    let book = service
        .get(book_id)?
        .ok_or_else(|| anyhow::anyhow!("No book with id {} in the catalog", book_id))?;
    let bookmarks = service.bookmarks(book_id)?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  ID: {}", book_id);
    println!("  Title: {}", book.title);
    if !book.author.is_empty() {
        println!("  Author: {}", book.author);
    }
    println!("  Identifier: {}", book.identifier);
    println!("  Source: {}", book.href);
    println!("  Added: {}", book.created.format("%Y-%m-%d %H:%M:%S"));
    println!("  Cover: {}", if book.cover.is_some() { "yes" } else { "no" });
    println!("  Bookmarks: {}", bookmarks.len());
    println!("╚═══════════════════════════════════════════════════════════════╝");

    Ok(())
}

/// Remove a publication and everything attached to it
async fn remove_book(book_id: BookId) -> Result<()> {
    let service = open_service(false).await?;

    if service.remove(book_id).await? {
        eprintln!("✅ Removed book {}", book_id);
        Ok(())
    } else {
        anyhow::bail!("No book with id {} in the catalog", book_id)
    }
}

/// Save a reading position for a publication
async fn add_bookmark(
    book_id: BookId,
    href: &str,
    progression: Option<f64>,
    media_type: &str,
) -> Result<()> {
    let service = open_service(false).await?;

    let mut locator = Locator::new(href, media_type);
    if let Some(progression) = progression {
        locator = locator.with_total_progression(progression);
    }

    let bookmark_id = service.add_bookmark(book_id, locator)?;
    eprintln!("✅ Saved bookmark {} for book {}", bookmark_id, book_id);
    Ok(())
}

/// List the bookmarks of a publication
async fn list_bookmarks(book_id: BookId) -> Result<()> {
    let service = open_service(false).await?;
    let bookmarks = service.bookmarks(book_id)?;

    if bookmarks.is_empty() {
        println!("No bookmarks for book {}", book_id);
        return Ok(());
    }

    println!("{:<6} {:<42} {:<10} {:<17}", "ID", "RESOURCE", "PROGRESS", "CREATED");
    println!("{}", "-".repeat(78));

    for bookmark in &bookmarks {
        let id = bookmark
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let progress = bookmark
            .progression
            .map(|p| format!("{:.1}%", p * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<42} {:<10} {:<17}",
            id,
            truncate(&bookmark.locator.href, 39),
            progress,
            bookmark.created.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

/// Delete one bookmark
async fn delete_bookmark(bookmark_id: BookmarkId) -> Result<()> {
    let service = open_service(false).await?;

    if service.delete_bookmark(bookmark_id)? {
        eprintln!("✅ Deleted bookmark {}", bookmark_id);
        Ok(())
    } else {
        anyhow::bail!("No bookmark with id {}", bookmark_id)
    }
}

/// Preload the bundled sample publications
async fn preload_samples(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let cfg = config::config()?;
    let dir = dir
        .or_else(|| cfg.samples.clone())
        .context("No samples directory configured. Pass --dir or set paths.samples")?;

    let service = open_service(false).await?;

    let summary = if force {
        Some(service.preload_samples(&dir).await?)
    } else {
        service
            .preload_samples_once(&dir, &cfg.samples_marker())
            .await?
    };

    match summary {
        Some(summary) => {
            eprintln!(
                "📚 Samples: {} added, {} skipped, {} failed",
                summary.added, summary.cancelled, summary.failed
            );
        }
        None => {
            eprintln!("📚 Samples already loaded; use --force to reload");
        }
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  Libris Configuration");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (catalog state): {}", cfg.home.display());
    println!("  Storage (books):      {}", cfg.storage.display());
    println!("  Database:             {}", cfg.db_path().display());
    println!(
        "  Samples:              {}",
        cfg.samples
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not configured)".to_string())
    );
    println!("  Samples marker:       {}", cfg.samples_marker().display());

    Ok(())
}

/// Shorten a string to fit a table column
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let prefix: String = s.chars().take(max).collect();
        format!("{}...", prefix)
    } else {
        s.to_string()
    }
}

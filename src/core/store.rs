//! SQLite-backed catalog store.
//!
//! Owns the two persisted tables, `books` and `bookmarks`, with a
//! cascade-delete foreign key from bookmarks to books. The connection
//! lives behind a mutex: one writer at a time, and every write is a
//! single transaction, so a failed insert never leaves a partial row
//! visible to readers.
//!
//! Duplicate detection is deliberately not a uniqueness constraint.
//! Whether two entries with the same identifier or source may coexist is
//! a user decision, so [`CatalogStore::insert_book`] checks a predicate
//! and reports [`StoreError::Duplicate`] for the caller to resolve.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::domain::{Book, BookId, Bookmark, BookmarkId};

/// Errors surfaced by the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A book with the same identifier or source reference already
    /// exists and the insert did not allow duplicates. Recoverable: the
    /// caller may retry with `allow_duplicate = true`.
    #[error("a publication with the same identifier or source is already in the catalog")]
    Duplicate,

    /// A bookmark referenced a book that is not in the catalog.
    #[error("no book with id {0} in the catalog")]
    MissingBook(BookId),

    /// A record failed validation before reaching the database.
    #[error("invalid record: {0}")]
    Constraint(String),

    /// Locator column could not be encoded or decoded.
    #[error("malformed locator record: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The store mutex was poisoned by a panicking writer.
    #[error("catalog store lock poisoned")]
    Poisoned,

    /// Any other SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Durable, queryable persistence for [`Book`] and [`Bookmark`] records.
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    /// Open (or create) the catalog database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Constraint(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory catalog (used by tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                href TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                identifier TEXT NOT NULL,
                cover BLOB,
                created INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bookmarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                locator TEXT NOT NULL,
                progression REAL
                    CHECK (progression IS NULL OR (progression >= 0.0 AND progression <= 1.0)),
                created INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_books_identifier ON books(identifier);
            CREATE INDEX IF NOT EXISTS idx_books_href ON books(href);
            CREATE INDEX IF NOT EXISTS idx_bookmarks_book ON bookmarks(book_id);
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a book record, returning the store-assigned identifier.
    ///
    /// Unless `allow_duplicate` is set, an existing row with the same
    /// `identifier` or the same `href` makes this fail with
    /// [`StoreError::Duplicate`] without writing anything.
    pub fn insert_book(&self, book: &Book, allow_duplicate: bool) -> Result<BookId, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !allow_duplicate {
            let duplicate: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM books WHERE identifier = ?1 OR href = ?2)",
                params![book.identifier, book.href],
                |row| row.get(0),
            )?;
            if duplicate {
                return Err(StoreError::Duplicate);
            }
        }

        tx.execute(
            "INSERT INTO books (href, title, author, identifier, cover, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                book.href,
                book.title,
                book.author,
                book.identifier,
                book.cover,
                book.created.timestamp_millis(),
            ],
        )?;
        let id = BookId(tx.last_insert_rowid());
        tx.commit()?;

        Ok(id)
    }

    /// Fetch a book by identifier.
    pub fn get_book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let conn = self.conn()?;
        let book = conn
            .query_row(
                "SELECT id, href, title, author, identifier, cover, created
                 FROM books WHERE id = ?1",
                params![id.0],
                row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    /// Remove a book row, cascading to its bookmarks. Returns whether a
    /// row was removed.
    pub fn delete_book(&self, id: BookId) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM books WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    }

    /// All books, most recently added first.
    pub fn list_books(&self) -> Result<Vec<Book>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, href, title, author, identifier, cover, created
             FROM books ORDER BY created DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_book)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    /// Insert a bookmark, returning the store-assigned identifier.
    ///
    /// The progression, when present, must lie in [0, 1]; the book it
    /// references must exist.
    pub fn insert_bookmark(&self, bookmark: &Bookmark) -> Result<BookmarkId, StoreError> {
        if let Some(progression) = bookmark.progression {
            if !(0.0..=1.0).contains(&progression) {
                return Err(StoreError::Constraint(format!(
                    "progression {} is outside [0, 1]",
                    progression
                )));
            }
        }
        let locator = serde_json::to_string(&bookmark.locator)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO bookmarks (book_id, locator, progression, created)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                bookmark.book_id.0,
                locator,
                bookmark.progression,
                bookmark.created.timestamp_millis(),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::MissingBook(bookmark.book_id)
            }
            other => StoreError::Sqlite(other),
        })?;

        Ok(BookmarkId(conn.last_insert_rowid()))
    }

    /// Bookmarks of one book, ordered by position within the publication:
    /// progression ascending, unknown progressions last, ties by creation.
    pub fn bookmarks_for_book(&self, book_id: BookId) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, locator, progression, created
             FROM bookmarks WHERE book_id = ?1
             ORDER BY progression IS NULL, progression ASC, created ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![book_id.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut bookmarks = Vec::new();
        for row in rows {
            let (id, locator, progression, created) = row?;
            bookmarks.push(Bookmark {
                id: Some(BookmarkId(id)),
                book_id,
                locator: serde_json::from_str(&locator)?,
                progression,
                created: timestamp_from_millis(created),
            });
        }
        Ok(bookmarks)
    }

    /// Remove one bookmark. Returns whether a row was removed.
    pub fn delete_bookmark(&self, id: BookmarkId) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM bookmarks WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    }
}

fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: Some(BookId(row.get(0)?)),
        href: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        identifier: row.get(4)?,
        cover: row.get(5)?,
        created: timestamp_from_millis(row.get(6)?),
    })
}

fn timestamp_from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Utc::now)
}

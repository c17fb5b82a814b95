//! Catalog record for an imported publication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a [`Book`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(pub i64);

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A publication entry in the catalog.
///
/// Books are immutable once inserted: the ingestion pipeline creates them,
/// and the only mutation is removal (which cascades to bookmarks and the
/// backing file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier, absent until the book is persisted.
    pub id: Option<BookId>,

    /// Source reference: the file name inside managed storage, or a
    /// remote URL string.
    pub href: String,

    /// Display title.
    pub title: String,

    /// Author names, joined with ", ".
    pub author: String,

    /// Format-defining identifier of the publication. Falls back to the
    /// file name when the publication declares none.
    pub identifier: String,

    /// Cover image bytes, when the publication provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Vec<u8>>,

    /// When the entry was added to the catalog.
    pub created: DateTime<Utc>,
}

impl Book {
    /// Create an unpersisted book record.
    pub fn new(
        href: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        identifier: impl Into<String>,
        cover: Option<Vec<u8>>,
    ) -> Self {
        Self {
            id: None,
            href: href.into(),
            title: title.into(),
            author: author.into(),
            identifier: identifier.into(),
            cover,
            created: Utc::now(),
        }
    }

    /// File name of the backing file inside managed storage, or `None`
    /// when the source reference is a remote URL.
    pub fn file_name(&self) -> Option<&str> {
        if self.href.contains("://") {
            None
        } else {
            Some(&self.href)
        }
    }
}

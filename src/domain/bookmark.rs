//! Reading-position bookmarks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::book::BookId;
use super::locator::Locator;

/// Store-assigned identifier of a [`Bookmark`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookmarkId(pub i64);

impl std::fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved position inside a cataloged publication.
///
/// Bookmarks are never mutated: the reader creates one when the user marks
/// a position, and it lives until it is deleted or its book is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    /// Store-assigned identifier, absent until persisted.
    pub id: Option<BookmarkId>,

    /// The book this bookmark belongs to.
    pub book_id: BookId,

    /// Position in the publication.
    pub locator: Locator,

    /// Progression through the publication, extracted from the locator
    /// at creation time. Used to order bookmarks.
    pub progression: Option<f64>,

    /// When the bookmark was created.
    pub created: DateTime<Utc>,
}

impl Bookmark {
    /// Create an unpersisted bookmark, deriving the progression from the
    /// locator's total progression.
    pub fn new(book_id: BookId, locator: Locator) -> Self {
        let progression = locator.total_progression();
        Self {
            id: None,
            book_id,
            locator,
            progression,
            created: Utc::now(),
        }
    }
}

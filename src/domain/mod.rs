//! Domain types for the libris catalog.
//!
//! This module contains the core data structures:
//! - Book: a persisted publication entry
//! - Bookmark: a saved reading position, owned by a book
//! - Locator: an opaque position descriptor within a publication
//! - LibraryEvent: catalog change notifications for observers

pub mod book;
pub mod bookmark;
pub mod events;
pub mod locator;

// Re-export commonly used types
pub use book::{Book, BookId};
pub use bookmark::{Bookmark, BookmarkId};
pub use events::LibraryEvent;
pub use locator::{Locations, Locator};

//! Catalog change notifications.
//!
//! The library service broadcasts a [`LibraryEvent`] after every ingestion
//! attempt and every removal. Observers (UI layers, the CLI, tests)
//! subscribe to refresh their view of the catalog; emission never blocks
//! and never fails the operation that triggered it.

use serde::{Deserialize, Serialize};

use super::book::BookId;

/// A change to the catalog, or the terminal state of an import attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum LibraryEvent {
    /// A publication was added to the catalog.
    EntryAdded {
        /// Identifier of the new entry.
        book_id: BookId,
    },

    /// An import found an entry with the same identifier or source and
    /// is waiting for a keep/discard decision.
    DuplicateDetected {
        /// Title of the publication being imported.
        title: String,
    },

    /// An import failed; the reason is the rendered error chain.
    ImportFailed {
        /// Human-readable failure reason.
        reason: String,
    },

    /// An import ended without effect: the user cancelled fulfillment or
    /// discarded a duplicate. Not an error.
    ImportCancelled,

    /// A publication and its bookmarks were removed from the catalog.
    EntryRemoved {
        /// Identifier of the removed entry.
        book_id: BookId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = LibraryEvent::EntryAdded { book_id: BookId(7) };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: LibraryEvent = serde_json::from_str(&json).unwrap();

        assert!(json.contains("\"entry_added\""));
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_cancelled_event_round_trip() {
        let json = serde_json::to_string(&LibraryEvent::ImportCancelled).unwrap();
        let parsed: LibraryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, LibraryEvent::ImportCancelled);
    }
}

//! Core persistence logic.
//!
//! This module contains:
//! - CatalogStore: SQLite-backed book and bookmark persistence

pub mod store;

// Re-export commonly used types
pub use store::{CatalogStore, StoreError};

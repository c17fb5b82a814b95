//! Publication ingestion pipeline.
//!
//! This module moves publications from arbitrary sources into the
//! catalog. The pipeline:
//!
//! 1. **Storage**: Stages the source file into managed storage
//! 2. **Protection**: First matching handler fulfills protected formats
//! 3. **Pipeline**: Extracts metadata and writes the catalog entry
//!
//! # Architecture
//!
//! ```text
//! file / URL → stage → protection check → fulfill → parse → catalog
//!                ↓ (on failure or cancel)
//!            discard staged artifacts
//! ```

pub mod pipeline;
pub mod storage;

// Re-export key types
pub use pipeline::{
    DiscardDuplicates, DuplicateDecision, DuplicateResolver, ImportError, ImportOutcome, Importer,
    KeepDuplicates,
};
pub use storage::FileStorage;

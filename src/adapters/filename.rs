//! Fallback publication opener.
//!
//! Derives metadata from the file itself when no format-aware parser is
//! wired in: the title comes from the file stem and everything else is
//! left empty. Enough to catalog and list publications without parsing
//! their container formats.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{PublicationMeta, PublicationOpener};

/// Opener that trusts the file name instead of parsing the format
#[derive(Debug, Default)]
pub struct FilenameOpener;

impl FilenameOpener {
    /// Create a new filename-based opener
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublicationOpener for FilenameOpener {
    async fn open(&self, path: &Path) -> Result<PublicationMeta> {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot open publication at {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("Publication path {} is not a file", path.display());
        }

        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| "Untitled".to_string());

        Ok(PublicationMeta {
            title,
            ..PublicationMeta::default()
        })
    }
}

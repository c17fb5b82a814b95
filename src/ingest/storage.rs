//! Managed publication storage.
//!
//! Every cataloged publication lives as a file in one flat directory
//! owned by the library. Files enter through [`FileStorage::stage`],
//! which copies them under a fresh collision-proof name, and move to
//! their final name through [`FileStorage::promote`] once ingestion
//! decides to keep them. Anything ingestion abandons is discarded, so
//! the directory never accumulates half-imported files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use uuid::Uuid;

/// Flat directory of publication files owned by the catalog
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open managed storage rooted at `root`, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create storage directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Directory holding the managed files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a managed file.
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Copy an outside file into storage under a fresh unique name,
    /// keeping the original extension. The source is left untouched.
    pub async fn stage(&self, source: &Path) -> Result<PathBuf> {
        let name = unique_name(source.extension().and_then(|e| e.to_str()));
        let staged = self.root.join(name);
        if let Err(e) = tokio::fs::copy(source, &staged).await {
            // A failed copy can leave a partial file behind.
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e)
                .with_context(|| format!("Failed to stage {} into storage", source.display()));
        }
        Ok(staged)
    }

    /// Move a file to its final name inside storage.
    ///
    /// When the preferred name is already taken the file gets a fresh
    /// unique name with the same extension instead; existing entries
    /// are never overwritten.
    pub async fn promote(&self, source: &Path, preferred_name: &str) -> Result<PathBuf> {
        let mut target = self.root.join(preferred_name);
        if path_exists(&target).await {
            let extension = Path::new(preferred_name)
                .extension()
                .and_then(|e| e.to_str());
            target = self.root.join(unique_name(extension));
        }
        move_file(source, &target).await?;
        Ok(target)
    }

    /// Remove a managed file by name. Returns whether it existed.
    pub async fn remove(&self, file_name: &str) -> Result<bool> {
        let path = self.path_of(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {} from storage", path.display()))
            }
        }
    }

    /// Best-effort removal of an intermediate artifact. Used on the
    /// failure and cancellation paths, where the original error (if
    /// any) matters more than the cleanup.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to discard staged file");
            }
        }
    }

    /// Remove every managed file, keeping the directory itself.
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to read storage directory {}", self.root.display()))?;

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path())
                    .await
                    .with_context(|| format!("Failed to remove {}", entry.path().display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn move_file(source: &Path, target: &Path) -> Result<()> {
    match tokio::fs::rename(source, target).await {
        Ok(()) => Ok(()),
        // rename fails across filesystems; fall back to copy + remove
        Err(_) => {
            tokio::fs::copy(source, target).await.with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    source.display(),
                    target.display()
                )
            })?;
            tokio::fs::remove_file(source)
                .await
                .with_context(|| format!("Failed to remove {} after copy", source.display()))?;
            Ok(())
        }
    }
}

fn unique_name(extension: Option<&str>) -> String {
    let id = Uuid::new_v4();
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", id, ext),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("books")).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_stage_copies_under_unique_name() {
        let (dir, storage) = storage().await;
        let source = dir.path().join("original.epub");
        tokio::fs::write(&source, b"publication").await.unwrap();

        let staged = storage.stage(&source).await.unwrap();

        assert_eq!(staged.extension().unwrap(), "epub");
        assert_ne!(staged.file_name().unwrap(), "original.epub");
        assert_eq!(tokio::fs::read(&staged).await.unwrap(), b"publication");
        // Source is untouched.
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_stage_without_extension() {
        let (dir, storage) = storage().await;
        let source = dir.path().join("README");
        tokio::fs::write(&source, b"text").await.unwrap();

        let staged = storage.stage(&source).await.unwrap();
        assert!(staged.extension().is_none());
    }

    #[tokio::test]
    async fn test_promote_prefers_suggested_name() {
        let (dir, storage) = storage().await;
        let source = dir.path().join("download.tmp");
        tokio::fs::write(&source, b"fulfilled").await.unwrap();

        let promoted = storage.promote(&source, "novel.epub").await.unwrap();

        assert_eq!(promoted, storage.path_of("novel.epub"));
        assert!(!source.exists());
        assert_eq!(tokio::fs::read(&promoted).await.unwrap(), b"fulfilled");
    }

    #[tokio::test]
    async fn test_promote_collision_gets_fresh_name() {
        let (dir, storage) = storage().await;
        tokio::fs::write(storage.path_of("novel.epub"), b"already here")
            .await
            .unwrap();

        let source = dir.path().join("download.tmp");
        tokio::fs::write(&source, b"newcomer").await.unwrap();

        let promoted = storage.promote(&source, "novel.epub").await.unwrap();

        assert_ne!(promoted, storage.path_of("novel.epub"));
        assert_eq!(promoted.extension().unwrap(), "epub");
        // The resident file is untouched.
        assert_eq!(
            tokio::fs::read(storage.path_of("novel.epub")).await.unwrap(),
            b"already here"
        );
        assert_eq!(tokio::fs::read(&promoted).await.unwrap(), b"newcomer");
    }

    #[tokio::test]
    async fn test_remove_reports_existence() {
        let (_dir, storage) = storage().await;
        tokio::fs::write(storage.path_of("gone.epub"), b"x")
            .await
            .unwrap();

        assert!(storage.remove("gone.epub").await.unwrap());
        assert!(!storage.remove("gone.epub").await.unwrap());
    }

    #[tokio::test]
    async fn test_discard_is_silent_on_missing_file() {
        let (_dir, storage) = storage().await;
        storage.discard(&storage.path_of("never-existed.epub")).await;
    }

    #[tokio::test]
    async fn test_clear_empties_the_directory() {
        let (_dir, storage) = storage().await;
        for name in ["a.epub", "b.pdf", "c"] {
            tokio::fs::write(storage.path_of(name), b"x").await.unwrap();
        }

        assert_eq!(storage.clear().await.unwrap(), 3);
        assert_eq!(storage.clear().await.unwrap(), 0);
    }
}

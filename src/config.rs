//! Configuration for libris paths.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LIBRIS_HOME, LIBRIS_STORAGE, LIBRIS_SAMPLES)
//! 2. Config file (.libris/config.yaml)
//! 3. Defaults (~/.libris)
//!
//! Config file discovery:
//! - Searches current directory and parents for .libris/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Catalog state directory (relative to config file)
    pub home: Option<String>,
    /// Managed publication storage (relative to config file)
    pub storage: Option<String>,
    /// Bundled sample publications to preload (relative to config file)
    pub samples: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to libris home (catalog state)
    pub home: PathBuf,
    /// Absolute path to managed publication storage
    pub storage: PathBuf,
    /// Absolute path to the sample publications, when configured
    pub samples: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Catalog database path ($LIBRIS_HOME/catalog.db)
    pub fn db_path(&self) -> PathBuf {
        self.home.join("catalog.db")
    }

    /// Marker recording the preloaded sample-set revision
    pub fn samples_marker(&self) -> PathBuf {
        self.home.join("samples_version")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".libris").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".libris");

    // Check for config file
    let config_file = find_config_file();

    let (home, storage, samples) = if let Some(ref config_path) = config_file {
        // Config file found - use it as base
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .libris/ (i.e., grandparent of config.yaml)
        let base_dir = config_path
            .parent() // .libris/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));

        // Resolve home path
        let home = if let Ok(env_home) = std::env::var("LIBRIS_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to .libris/ directory
            let libris_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(libris_dir, home_path)
        } else {
            default_home.clone()
        };

        // Resolve storage path
        let storage = if let Ok(env_storage) = std::env::var("LIBRIS_STORAGE") {
            PathBuf::from(env_storage)
        } else if let Some(ref storage_path) = config.paths.storage {
            resolve_path(base_dir, storage_path)
        } else {
            home.join("books")
        };

        // Resolve samples path
        let samples = if let Ok(env_samples) = std::env::var("LIBRIS_SAMPLES") {
            Some(PathBuf::from(env_samples))
        } else {
            config
                .paths
                .samples
                .as_ref()
                .map(|samples_path| resolve_path(base_dir, samples_path))
        };

        (home, storage, samples)
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("LIBRIS_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let storage = std::env::var("LIBRIS_STORAGE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("books"));

        let samples = std::env::var("LIBRIS_SAMPLES").map(PathBuf::from).ok();

        (home, storage, samples)
    };

    Ok(ResolvedConfig {
        home,
        storage,
        samples,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the libris home directory (catalog state).
pub fn libris_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the managed publication storage directory.
pub fn storage_dir() -> Result<PathBuf> {
    Ok(config()?.storage.clone())
}

/// Get the catalog database path ($LIBRIS_HOME/catalog.db)
pub fn db_path() -> Result<PathBuf> {
    Ok(config()?.db_path())
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local directory backing store.
//!
//! Exposes a directory tree as a hierarchical store: ids are `/`-separated paths
//! relative to the root, revisions are derived from modification time and size.

use crate::domain::{ConfigError, Query, Result};
use crate::ports::{BackingStoreClient, ListingEntry};
use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Maximum allowed file size (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// [`BackingStoreClient`] over a local directory.
///
/// # Examples
///
/// ```rust,no_run
/// use layercfg::adapters::FilesystemStore;
///
/// // A specific directory
/// let store = FilesystemStore::new("/etc/myapp").unwrap();
///
/// // The OS configuration directory for an application
/// let store = FilesystemStore::from_default_location("myapp", "com.example").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    name: String,
    root: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at `root`, which must be an existing directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|e| ConfigError::transient(
            "filesystem",
            root.display().to_string(),
            e,
        ))?;
        if !canonical.is_dir() {
            return Err(ConfigError::invalid_reference(
                root.display().to_string(),
                "filesystem store root is not a directory",
            ));
        }
        Ok(Self {
            name: "filesystem".to_string(),
            root: canonical,
        })
    }

    /// Creates a store rooted at the OS-appropriate configuration directory.
    pub fn from_default_location(app_name: &str, qualifier: &str) -> Result<Self> {
        let dirs = ProjectDirs::from(qualifier, "", app_name).ok_or_else(|| {
            ConfigError::invalid_reference(app_name, "failed to determine project directories")
        })?;
        Self::new(dirs.config_dir())
    }

    /// Overrides the store name used in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an id onto a path below the root, rejecting traversal.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ConfigError::invalid_reference(
                id,
                "filesystem ids must be relative paths without '..'",
            ));
        }
        Ok(self.root.join(relative))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<ListingEntry>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(ConfigError::transient(
                    self.name.clone(),
                    dir.display().to_string(),
                    e,
                ))
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| {
                ConfigError::transient(self.name.clone(), dir.display().to_string(), e)
            })?;
            let path = entry.path();
            let metadata = entry.metadata().map_err(|e| {
                ConfigError::transient(self.name.clone(), path.display().to_string(), e)
            })?;
            if metadata.is_dir() {
                self.walk(&path, out)?;
            } else if metadata.is_file() {
                if let Some(id) = self.relative_id(&path) {
                    out.push(ListingEntry::new(id, Some(revision_of(&metadata))));
                }
            }
        }
        Ok(())
    }

    fn relative_id(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

fn revision_of(metadata: &fs::Metadata) -> String {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}", mtime, metadata.len())
}

impl BackingStoreClient for FilesystemStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn listing(&self, _query: &Query) -> Result<Vec<ListingEntry>> {
        let mut entries = Vec::new();
        self.walk(&self.root, &mut entries)?;
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(store = %self.name, entries = entries.len(), "listed filesystem store");
        Ok(entries)
    }

    fn content(&self, id: &str) -> Result<Option<String>> {
        let path = self.resolve(id)?;
        let metadata = match fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::transient(self.name.clone(), id, e)),
        };

        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigError::transient(
                self.name.clone(),
                id,
                format!(
                    "configuration file too large: {} bytes (max {} bytes)",
                    metadata.len(),
                    MAX_FILE_SIZE
                ),
            ));
        }

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::transient(self.name.clone(), id, e)),
        }
    }
}

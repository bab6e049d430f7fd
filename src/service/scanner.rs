// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory-style view over a backing store listing.
//!
//! [`DirectoryScanner`] takes one listing snapshot per query and answers every
//! directory question from it, so expanding any number of base paths costs at most
//! one remote listing call. It also implements the overlay convention: a base path
//! resolves to a primary document plus every entry of an overlay directory.

use crate::domain::{FetchTarget, Query, Result};
use crate::ports::{BackingStoreClient, ListingEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Default primary document name inside a base path.
pub const DEFAULT_PRIMARY_NAME: &str = "application.yaml";

/// Default overlay directory name inside a base path.
pub const DEFAULT_OVERLAY_DIR: &str = "conf.d";

/// Targets a single base path expands to.
///
/// `primary` is the base itself (when it names a file) or `base/<primary name>`;
/// `overlays` are sorted by name. Later overlays take precedence over earlier ones
/// and over the primary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedBase {
    /// The logical base path
    pub base: String,
    /// Primary document, if present
    pub primary: Option<FetchTarget>,
    /// Overlay entries in ascending name order
    pub overlays: Vec<FetchTarget>,
}

impl ScannedBase {
    /// Returns true if nothing was found for the base.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.overlays.is_empty()
    }

    /// Every target, primary first then overlays in ascending order.
    pub fn targets(&self) -> impl Iterator<Item = &FetchTarget> + '_ {
        self.primary.iter().chain(self.overlays.iter())
    }
}

/// A reusable, per-query snapshot of a hierarchical store namespace.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::InMemoryStore;
/// use layercfg::domain::Query;
/// use layercfg::service::DirectoryScanner;
///
/// let store = InMemoryStore::new("mem");
/// store.put("app/application.yaml", "a: 1");
/// store.put("app/conf.d/01-x.conf", "b: 2");
///
/// let scanner = DirectoryScanner::new(&store, &Query::new("app")).unwrap();
/// assert!(scanner.is_directory("app"));
/// assert!(scanner.path_exists("app/application.yaml"));
/// let names: Vec<&str> = scanner.list_directory("app").collect();
/// assert_eq!(names, vec!["application.yaml", "conf.d"]);
/// assert_eq!(store.listing_calls(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    files: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, BTreeSet<String>>,
}

impl DirectoryScanner {
    /// Takes a listing snapshot from `client` for `query`.
    pub fn new(client: &dyn BackingStoreClient, query: &Query) -> Result<Self> {
        let listing = client.listing(query)?;
        tracing::debug!(
            store = %client.name(),
            entries = listing.len(),
            "took store listing snapshot"
        );
        Ok(Self::from_entries(listing))
    }

    /// Builds a scanner from listing entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ListingEntry>,
    {
        let mut files = BTreeMap::new();
        let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for entry in entries {
            let id = normalize(&entry.id);
            if id.is_empty() {
                continue;
            }

            let segments: Vec<&str> = id.split('/').collect();
            for depth in 0..segments.len() {
                let parent = segments[..depth].join("/");
                children
                    .entry(parent)
                    .or_default()
                    .insert(segments[depth].to_string());
            }
            files.insert(id, entry.revision);
        }

        Self { files, children }
    }

    /// Returns true if `path` has at least one entry below it.
    pub fn is_directory(&self, path: &str) -> bool {
        self.children.contains_key(&normalize(path))
    }

    /// Returns true if `path` is a listed entry.
    pub fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    /// Returns true if `path` is either an entry or a directory.
    pub fn path_exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    /// Direct child names of `path` in ascending order; empty if `path` is not a directory.
    ///
    /// Every call starts a fresh iteration over the snapshot.
    pub fn list_directory(&self, path: &str) -> impl Iterator<Item = &str> + '_ {
        self.children
            .get(&normalize(path))
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Fetch target for a listed entry, carrying its revision.
    pub fn target(&self, path: &str) -> Option<FetchTarget> {
        let id = normalize(path);
        let revision = self.files.get(&id)?;
        Some(match revision {
            Some(rev) => FetchTarget::with_revision(id, rev.clone()),
            None => FetchTarget::new(id),
        })
    }

    /// Expands `base` into its primary and overlay targets.
    ///
    /// A base that names an entry directly yields just that entry. Hidden overlay
    /// entries (names starting with `.`) and nested directories are skipped.
    pub fn expand(&self, base: &str, primary_name: &str, overlay_dir: Option<&str>) -> ScannedBase {
        let base = normalize(base);
        if self.is_file(&base) {
            return ScannedBase {
                primary: self.target(&base),
                base,
                overlays: Vec::new(),
            };
        }

        let primary = self.target(&join(&base, primary_name));
        let overlays = match overlay_dir {
            Some(dir) => {
                let dir = join(&base, dir);
                self.list_directory(&dir)
                    .filter(|name| !name.starts_with('.'))
                    .filter_map(|name| self.target(&join(&dir, name)))
                    .collect()
            }
            None => Vec::new(),
        };

        tracing::trace!(
            base = %base,
            primary = primary.is_some(),
            overlays = overlays.len(),
            "expanded base path"
        );
        ScannedBase {
            base,
            primary,
            overlays,
        }
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

fn join(base: &str, name: &str) -> String {
    let name = name.trim_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(ids: &[&str]) -> DirectoryScanner {
        DirectoryScanner::from_entries(
            ids.iter()
                .enumerate()
                .map(|(i, id)| ListingEntry::new(*id, Some(i.to_string()))),
        )
    }

    #[test]
    fn test_directory_primitives() {
        let s = scanner(&["app/application.yaml", "app/conf.d/01.conf", "other.yaml"]);

        assert!(s.is_directory("app"));
        assert!(s.is_directory("/app/conf.d/"));
        assert!(s.is_directory(""));
        assert!(!s.is_directory("app/application.yaml"));

        assert!(s.path_exists("app/application.yaml"));
        assert!(s.path_exists("app/conf.d"));
        assert!(!s.path_exists("missing"));

        let root: Vec<&str> = s.list_directory("/").collect();
        assert_eq!(root, vec!["app", "other.yaml"]);
        assert_eq!(s.list_directory("missing").count(), 0);
    }

    #[test]
    fn test_list_directory_is_restartable() {
        let s = scanner(&["a/x", "a/y"]);
        let first: Vec<&str> = s.list_directory("a").collect();
        let second: Vec<&str> = s.list_directory("a").collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expand_with_overlays_sorted() {
        let s = scanner(&[
            "app/conf.d/02-y.conf",
            "app/application.yaml",
            "app/conf.d/01-x.conf",
            "app/conf.d/.hidden",
            "app/conf.d/nested/deep.conf",
        ]);
        let scanned = s.expand("app", DEFAULT_PRIMARY_NAME, Some(DEFAULT_OVERLAY_DIR));

        assert_eq!(scanned.primary.unwrap().id(), "app/application.yaml");
        let overlays: Vec<&str> = scanned.overlays.iter().map(|t| t.id()).collect();
        assert_eq!(overlays, vec!["app/conf.d/01-x.conf", "app/conf.d/02-y.conf"]);
    }

    #[test]
    fn test_expand_without_overlays() {
        let s = scanner(&["app/application.yaml", "app/conf.d/01-x.conf"]);
        let scanned = s.expand("app", DEFAULT_PRIMARY_NAME, None);
        assert!(scanned.primary.is_some());
        assert!(scanned.overlays.is_empty());
    }

    #[test]
    fn test_expand_file_base() {
        let s = scanner(&["shared/db.yaml"]);
        let scanned = s.expand("shared/db.yaml", DEFAULT_PRIMARY_NAME, Some(DEFAULT_OVERLAY_DIR));
        assert_eq!(scanned.targets().count(), 1);
        assert_eq!(scanned.primary.unwrap().revision(), Some("0"));
    }

    #[test]
    fn test_expand_missing_base() {
        let s = scanner(&["app/application.yaml"]);
        let scanned = s.expand("nope", DEFAULT_PRIMARY_NAME, Some(DEFAULT_OVERLAY_DIR));
        assert!(scanned.is_empty());
    }
}

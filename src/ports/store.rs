// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backing store client trait definition.
//!
//! This module defines the [`BackingStoreClient`] trait, the port through which the
//! fetch pipeline lists and reads raw configuration content. Concrete connectors
//! (object storage, local directories, ...) implement it.

use crate::domain::{Query, Result};

/// One entry of a store listing: a target identifier and its revision tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListingEntry {
    /// `/`-separated store identifier
    pub id: String,
    /// Store-reported revision (etag, version, mtime); `None` if unsupported
    pub revision: Option<String>,
}

impl ListingEntry {
    /// Creates a listing entry.
    pub fn new(id: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            id: id.into(),
            revision,
        }
    }
}

/// A trait for hierarchical backing stores.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one client handle is shared by every fetch
/// task of a [`SourceFetcher`](crate::service::SourceFetcher), possibly across worker
/// threads.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::{Query, Result};
/// use layercfg::ports::{BackingStoreClient, ListingEntry};
///
/// struct SingleFile;
///
/// impl BackingStoreClient for SingleFile {
///     fn name(&self) -> &str {
///         "single"
///     }
///
///     fn listing(&self, _query: &Query) -> Result<Vec<ListingEntry>> {
///         Ok(vec![ListingEntry::new("cfg/application.yaml", None)])
///     }
///
///     fn content(&self, id: &str) -> Result<Option<String>> {
///         Ok((id == "cfg/application.yaml").then(|| "a: 1".to_string()))
///     }
/// }
/// ```
pub trait BackingStoreClient: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Lists every target visible for `query`, ordered by id.
    ///
    /// Called at most once per fetch; the result is the snapshot the
    /// [`DirectoryScanner`](crate::service::DirectoryScanner) resolves against.
    fn listing(&self, query: &Query) -> Result<Vec<ListingEntry>>;

    /// Reads the raw text of a target.
    ///
    /// Returns `Ok(None)` if the target does not exist; any other failure is an error.
    fn content(&self, id: &str) -> Result<Option<String>>;

    /// Releases the client. Must be idempotent.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

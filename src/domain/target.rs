// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetch targets and cache keys.

use crate::domain::errors::{ConfigError, Result};
use std::fmt;

/// A concrete, store-specific fetchable unit plus the revision reported by the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FetchTarget {
    id: String,
    revision: Option<String>,
}

impl FetchTarget {
    /// Creates a target without a revision tag.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: None,
        }
    }

    /// Creates a target carrying a revision tag (etag, version, mtime...).
    pub fn with_revision(id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revision: Some(revision.into()),
        }
    }

    /// Store-specific identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Revision tag, if the store reported one.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Cache key for this target and its current revision.
    pub fn cache_key(&self) -> Result<CacheKey> {
        CacheKey::new(self.id.clone(), self.revision.clone().unwrap_or_default())
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}@{}", self.id, rev),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Cache key: target identity plus revision indicator.
///
/// Two keys with the same identity but different revisions address the same cache
/// slot; a lookup only hits when the revisions match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identity: String,
    revision: String,
}

impl CacheKey {
    /// Creates a cache key; the identity must not be blank.
    pub fn new(identity: impl Into<String>, revision: impl Into<String>) -> Result<Self> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ConfigError::invalid_reference(
                identity,
                "cache key identity must not be empty",
            ));
        }
        Ok(Self {
            identity,
            revision: revision.into(),
        })
    }

    /// Logical target identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Revision indicator; empty when the store reports none.
    pub fn revision(&self) -> &str {
        &self.revision
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.identity, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_from_target() {
        let target = FetchTarget::with_revision("cfg/application.yaml", "etag-1");
        let key = target.cache_key().unwrap();
        assert_eq!(key.identity(), "cfg/application.yaml");
        assert_eq!(key.revision(), "etag-1");
        assert_eq!(key.to_string(), "cfg/application.yaml|etag-1");
    }

    #[test]
    fn test_cache_key_without_revision() {
        let key = FetchTarget::new("a").cache_key().unwrap();
        assert_eq!(key.revision(), "");
    }

    #[test]
    fn test_blank_identity_is_invalid() {
        let err = CacheKey::new("  ", "r").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReference { .. }));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(FetchTarget::with_revision("a", "1").to_string(), "a@1");
        assert_eq!(FetchTarget::new("a").to_string(), "a");
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dotted document path.
//!
//! A [`ConfigKey`] addresses a node inside a [`Document`](crate::domain::Document)
//! using dot notation (`database.connection.host`). The empty key addresses the root.

use crate::domain::errors::{ConfigError, Result};
use std::fmt;

/// A validated, dot-separated path into a document tree.
///
/// # Examples
///
/// ```
/// use layercfg::domain::ConfigKey;
///
/// let key = ConfigKey::parse("database.host").unwrap();
/// assert_eq!(key.segments().collect::<Vec<_>>(), vec!["database", "host"]);
/// assert!(ConfigKey::parse("database..host").is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Parses a dotted path, rejecting empty segments.
    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        if trimmed.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(ConfigError::invalid_reference(
                key.clone(),
                "configuration path contains an empty segment",
            ));
        }
        Ok(ConfigKey(trimmed.to_string()))
    }

    /// The key addressing the document root.
    pub fn root() -> Self {
        ConfigKey(String::new())
    }

    /// Returns true if this key addresses the root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path segments; empty for the root key.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Returns a new key with `segment` appended.
    pub fn child(&self, segment: &str) -> Self {
        if self.is_root() {
            ConfigKey(segment.to_string())
        } else {
            ConfigKey(format!("{}.{}", self.0, segment))
        }
    }
}

impl TryFrom<&str> for ConfigKey {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self> {
        ConfigKey::parse(s)
    }
}

impl TryFrom<String> for ConfigKey {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self> {
        ConfigKey::parse(s)
    }
}

impl AsRef<str> for ConfigKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

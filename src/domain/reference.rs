// SPDX-License-Identifier: MIT OR Apache-2.0

//! External value references embedded in documents.
//!
//! A string leaf of the form `${tag://name}` names a value held by an external
//! connector (secret store, parameter store, environment...).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$\{\s*([A-Za-z0-9_.\-]+)://([^}]+?)\s*\}$").expect("valid reference regex")
});

/// A parsed `${tag://name}` reference.
///
/// # Examples
///
/// ```
/// use layercfg::domain::ValueReference;
///
/// let r = ValueReference::parse("${ssm:///db/password}").unwrap();
/// assert_eq!(r.type_tag(), "ssm");
/// assert_eq!(r.name(), "/db/password");
/// assert!(ValueReference::parse("plain value").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueReference {
    type_tag: String,
    name: String,
}

impl ValueReference {
    /// Creates a reference.
    pub fn new(type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: name.into(),
        }
    }

    /// Parses a string leaf; returns `None` when it is not a reference.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = REFERENCE.captures(raw.trim())?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    /// Declared reference type.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Referenced name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}://{}}}", self.type_tag, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let r = ValueReference::parse("${env://HOME}").unwrap();
        assert_eq!(r, ValueReference::new("env", "HOME"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let r = ValueReference::parse("  ${ aws.ssm://a/b }  ").unwrap();
        assert_eq!(r.type_tag(), "aws.ssm");
        assert_eq!(r.name(), "a/b");
    }

    #[test]
    fn test_non_references() {
        for raw in ["", "plain", "${application}", "http://x", "${env://}", "x ${env://A}"] {
            assert!(ValueReference::parse(raw).is_none(), "{}", raw);
        }
    }

    #[test]
    fn test_display_roundtrip() {
        let r = ValueReference::new("vault", "kv/db");
        assert_eq!(ValueReference::parse(&r.to_string()), Some(r));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document parser trait definition.
//!
//! This module defines the [`DocumentParser`] trait, which turns raw target content
//! into an immutable [`Document`]. The document grammar itself belongs to the
//! parser; the fetch pipeline only orchestrates parsing and merging.

use crate::domain::{Document, Result};

/// A trait for parsing raw configuration content.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::{Document, Result};
/// use layercfg::ports::DocumentParser;
///
/// struct EmptyParser;
///
/// impl DocumentParser for EmptyParser {
///     fn parse(&self, _content: &str) -> Result<Document> {
///         Ok(Document::empty())
///     }
///
///     fn supported_extensions(&self) -> &[&str] {
///         &["empty"]
///     }
/// }
///
/// assert!(EmptyParser.supports("app.empty"));
/// assert!(!EmptyParser.supports("app.yaml"));
/// ```
pub trait DocumentParser: Send + Sync {
    /// Parses raw content into a document.
    ///
    /// # Returns
    ///
    /// * `Ok(Document)` - The parsed document; blank content yields an empty document
    /// * `Err(ConfigError::ParseError)` - The content is malformed
    fn parse(&self, content: &str) -> Result<Document>;

    /// File extensions (without the dot) this parser handles.
    fn supported_extensions(&self) -> &[&str];

    /// Returns true if the target id carries a supported extension.
    fn supports(&self, id: &str) -> bool {
        let name = id.rsplit('/').next().unwrap_or(id);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .supported_extensions()
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

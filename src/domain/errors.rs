// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration crate.
//!
//! Every failure of the fetch, resolve and distribute pipeline is expressed as a
//! [`ConfigError`]. Cache misses are not errors; they are plain `None` values.

use thiserror::Error;

/// Boxed error cause carried by the wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for configuration operations.
///
/// The enum is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use layercfg::domain::errors::ConfigError;
///
/// fn lookup() -> Result<String, ConfigError> {
///     Err(ConfigError::NotFound {
///         what: "database.host".to_string(),
///     })
/// }
///
/// assert!(lookup().unwrap_err().is_not_found());
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A backing store or connector call failed. Never retried internally.
    #[error("Fetch from '{source_name}' failed for '{target}': {source}")]
    TransientFetch {
        /// The name of the store or connector that failed
        source_name: String,
        /// The target or batch that was being fetched
        target: String,
        /// The underlying error
        #[source]
        source: BoxError,
    },

    /// A requested target does not exist and the missing-target policy is fail-hard.
    #[error("Configuration location '{target}' does not exist in '{source_name}'")]
    MissingTarget {
        /// The name of the store that was queried
        source_name: String,
        /// The missing target or logical path
        target: String,
    },

    /// Reference names could not be resolved and missing names are not allowed.
    #[error("Resolver '{resolver}' could not resolve: {}", .names.join(", "))]
    MissingReferences {
        /// The resolver name
        resolver: String,
        /// Names that were not returned by the connector
        names: Vec<String>,
    },

    /// A logical path, value reference or key is malformed.
    #[error("Invalid reference '{reference}': {message}")]
    InvalidReference {
        /// The offending input
        reference: String,
        /// What is wrong with it
        message: String,
    },

    /// No value is present.
    #[error("No value present: {what}")]
    NotFound {
        /// Description of the missing value
        what: String,
    },

    /// An operation was attempted on a closed instance.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// The error message
        message: String,
    },

    /// Failed to convert a value to the requested type.
    #[error("Failed to convert value at '{key}' to type {target_type}: {source}")]
    TypeConversion {
        /// The key being converted
        key: String,
        /// The target type name
        target_type: String,
        /// The underlying conversion error
        source: BoxError,
    },

    /// Failed to parse raw content into a document.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<BoxError>,
    },

    /// An error occurred in a store watcher.
    #[error("Configuration watcher error: {message}")]
    WatcherError {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Wraps a store or connector failure.
    pub fn transient(
        source_name: impl Into<String>,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ConfigError::TransientFetch {
            source_name: source_name.into(),
            target: target.into(),
            source: source.into(),
        }
    }

    /// Creates an [`ConfigError::IllegalState`] error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        ConfigError::IllegalState {
            message: message.into(),
        }
    }

    /// Creates an [`ConfigError::InvalidReference`] error.
    pub fn invalid_reference(reference: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidReference {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Returns true for the not-found signal of an empty reloadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }

    /// Returns true for the illegal-state signal of a closed instance.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, ConfigError::IllegalState { .. })
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

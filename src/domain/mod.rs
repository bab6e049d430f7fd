// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core types.
//!
//! This module contains the value types the pipeline operates on: queries,
//! documents, fetch targets, value references and the error taxonomy. It has no
//! knowledge of concrete backing stores.

pub mod config_key;
pub mod config_value;
pub mod document;
pub mod errors;
pub mod query;
pub mod reference;
pub mod target;

// Re-export commonly used types
pub use config_key::ConfigKey;
pub use config_value::ConfigValue;
pub use document::Document;
pub use errors::{ConfigError, Result};
pub use query::Query;
pub use reference::ValueReference;
pub use target::{CacheKey, FetchTarget};

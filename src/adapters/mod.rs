// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing port implementations.
//!
//! This module contains concrete implementations of the traits defined in the
//! ports layer: the YAML document parser, local and in-memory backing stores,
//! value reference connectors and store watchers.

#[cfg(feature = "env")]
pub mod env_var;
#[cfg(feature = "filesystem")]
pub mod filesystem;
pub mod memory;
pub mod yaml;

pub mod watchers;

// Re-export adapters based on feature flags
#[cfg(feature = "env")]
pub use env_var::EnvVarConnector;
#[cfg(feature = "filesystem")]
pub use filesystem::FilesystemStore;
pub use memory::{InMemoryStore, MapConnector};
#[cfg(feature = "reload")]
pub use watchers::FileWatcher;
pub use yaml::YamlParser;

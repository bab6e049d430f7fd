// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration aggregation with hot reload.
//!
//! This crate gathers hierarchical configuration documents from several backing
//! stores, merges them deterministically, resolves `${tag://name}` references to
//! external values in batches, and hands the result to consumers through
//! reloadable, observable values.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: Core types (`Query`, `Document`, `FetchTarget`, errors)
//! - **Ports**: Trait definitions for collaborators (`BackingStoreClient`,
//!   `ValueReferenceConnector`, `DocumentParser`, `Clock`, `StoreWatcher`)
//! - **Adapters**: Implementations for specific stores and connectors (filesystem,
//!   in-memory, environment variables, YAML)
//! - **Service**: The fetch, resolve and distribute pipeline
//!
//! # Pipeline
//!
//! A host drives refresh cycles on its own schedule:
//!
//! 1. [`SourceFetcher::fetch`](service::SourceFetcher::fetch) interpolates logical
//!    paths, expands overlay directories, fetches through a TTL and revision
//!    checked cache and merges first-listed-wins
//! 2. [`ReferenceSubstitution::apply`](service::ReferenceSubstitution::apply)
//!    resolves external value references
//! 3. [`ReloadableRegistry::update`](service::ReloadableRegistry::update) publishes
//!    the document to every [`Reloadable`](service::Reloadable) view whose value changed
//!
//! A failing cycle leaves the last good document in place.
//!
//! # Feature Flags
//!
//! - `filesystem`: Local directory store (default)
//! - `env`: Environment variable connector (default)
//! - `reload`: File watching for filesystem stores
//! - `full`: Enable all features
//!
//! # Quick Start
//!
//! ```rust
//! use layercfg::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(InMemoryStore::new("mem"));
//! store.put("billing/application.yaml", "server:\n  port: 8080\n");
//! store.put("billing/conf.d/10-override.yaml", "server:\n  port: 9090\n");
//!
//! let registry = Arc::new(ReloadableRegistry::new());
//! let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("billing"))
//!     .with_fetcher(Arc::new(SourceFetcher::new(store, FetcherConfig::new("mem"))))
//!     .with_paths(["${application}"]);
//!
//! let port = registry.at("server.port")?;
//! cycle.run_once()?;
//! assert_eq!(port.get()?.as_u64(), Some(9090));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{ConfigError, ConfigKey, ConfigValue, Document, Query, Result};
    pub use crate::ports::{BackingStoreClient, DocumentParser, ValueReferenceConnector};
    pub use crate::service::{
        ConnectorRegistry, FetcherConfig, MissingPolicy, ReferenceSubstitution, RefreshCycle,
        Reloadable, ReloadableRegistry, ResolverConfig, SourceFetcher, ValueReferenceResolver,
    };

    // Re-export adapters based on feature flags
    #[cfg(feature = "env")]
    pub use crate::adapters::EnvVarConnector;
    #[cfg(feature = "filesystem")]
    pub use crate::adapters::FilesystemStore;
    pub use crate::adapters::{InMemoryStore, MapConnector, YamlParser};
}

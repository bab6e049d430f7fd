// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer containing the fetch, resolve and distribute pipeline.
//!
//! A refresh cycle flows through these modules in order: [`SourceFetcher`] (with
//! [`DirectoryScanner`] and [`ValueCache`]) produces a merged document,
//! [`ReferenceSubstitution`] resolves external references through
//! [`ValueReferenceResolver`]s, and [`ReloadableRegistry`] publishes the result to
//! [`Reloadable`] views. [`RefreshCycle`] ties the steps together.

pub mod cache;
pub mod fetcher;
pub mod refresh;
pub mod registry;
pub mod reloadable;
pub mod resolver;
pub mod scanner;
pub mod tasks;

// Re-export commonly used types
pub use cache::{ValueCache, DEFAULT_CACHE_TTL};
pub use fetcher::{FetcherConfig, MissingPolicy, OverlayConfig, SourceFetcher};
pub use refresh::RefreshCycle;
pub use registry::ReloadableRegistry;
pub use reloadable::Reloadable;
pub use resolver::{
    ConnectorFactory, ConnectorRegistry, ReferenceSubstitution, ResolverConfig,
    ValueReferenceResolver, DEFAULT_BATCH_SIZE,
};
pub use scanner::{DirectoryScanner, ScannedBase, DEFAULT_OVERLAY_DIR, DEFAULT_PRIMARY_NAME};
pub use tasks::DEFAULT_MAX_WORKERS;

// SPDX-License-Identifier: MIT OR Apache-2.0

//! One refresh cycle: fetch, substitute references, publish.
//!
//! The crate has no scheduler of its own. A host calls
//! [`RefreshCycle::run_once`] on its own timer, or from a
//! [`StoreWatcher`] callback through [`RefreshCycle::watch_with`].

use crate::domain::{Document, Query, Result};
use crate::ports::StoreWatcher;
use crate::service::fetcher::SourceFetcher;
use crate::service::registry::ReloadableRegistry;
use crate::service::resolver::ReferenceSubstitution;
use std::sync::{Arc, Mutex, PoisonError};

/// Drives fetchers, reference substitution and the registry for one query.
///
/// Fetchers are merged first-listed-wins. A failing cycle leaves the registry
/// holding its last good document.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::{InMemoryStore, MapConnector};
/// use layercfg::domain::Query;
/// use layercfg::service::{
///     FetcherConfig, RefreshCycle, ReferenceSubstitution, ReloadableRegistry, ResolverConfig,
///     SourceFetcher, ValueReferenceResolver,
/// };
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new("mem"));
/// store.put("app/application.yaml", "db:\n  password: ${vault://db}\n");
///
/// let vault = Arc::new(MapConnector::new("vault").with_value("db", "hunter2"));
/// let registry = Arc::new(ReloadableRegistry::new());
/// let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
///     .with_fetcher(Arc::new(SourceFetcher::new(store, FetcherConfig::new("mem"))))
///     .with_substitution(
///         ReferenceSubstitution::new()
///             .with_resolver(ValueReferenceResolver::new(vault, ResolverConfig::default())),
///     )
///     .with_paths(["app"]);
///
/// cycle.run_once().unwrap();
/// let password = registry.at("db.password").unwrap();
/// assert_eq!(password.get().unwrap().as_str(), Some("hunter2"));
/// ```
#[derive(Debug)]
pub struct RefreshCycle {
    registry: Arc<ReloadableRegistry>,
    query: Query,
    paths: Vec<String>,
    fetchers: Vec<Arc<SourceFetcher>>,
    substitution: ReferenceSubstitution,
    running: Mutex<()>,
}

impl RefreshCycle {
    /// Creates a cycle publishing into `registry`.
    pub fn new(registry: Arc<ReloadableRegistry>, query: Query) -> Self {
        Self {
            registry,
            query,
            paths: Vec::new(),
            fetchers: Vec::new(),
            substitution: ReferenceSubstitution::new(),
            running: Mutex::new(()),
        }
    }

    /// Adds a fetcher; earlier fetchers take precedence.
    pub fn with_fetcher(mut self, fetcher: Arc<SourceFetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }

    /// Sets the reference substitution step.
    pub fn with_substitution(mut self, substitution: ReferenceSubstitution) -> Self {
        self.substitution = substitution;
        self
    }

    /// Sets the logical paths handed to every fetcher.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Registry receiving the documents.
    pub fn registry(&self) -> &Arc<ReloadableRegistry> {
        &self.registry
    }

    /// Query used for every fetch.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Fetches and substitutes without publishing.
    pub fn assemble(&self) -> Result<Document> {
        let mut documents = Vec::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            documents.push(fetcher.fetch(&self.query, &self.paths)?);
        }
        let merged = Document::merge_all(documents.iter());
        self.substitution.apply(&merged)
    }

    /// Runs one cycle and publishes the result.
    ///
    /// Concurrent calls on the same cycle run one after the other.
    pub fn run_once(&self) -> Result<Document> {
        let _guard = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match self.assemble() {
            Ok(doc) => {
                self.registry.update(doc.clone())?;
                tracing::debug!(
                    application = %self.query.application(),
                    keys = doc.as_mapping().len(),
                    "refresh cycle completed"
                );
                Ok(doc)
            }
            Err(e) => {
                tracing::warn!(
                    application = %self.query.application(),
                    error = %e,
                    "refresh cycle failed, keeping last good configuration"
                );
                Err(e)
            }
        }
    }

    /// Runs a cycle every time `watcher` reports a change.
    ///
    /// Errors are logged; the registry keeps its last good document.
    pub fn watch_with(self: &Arc<Self>, watcher: &mut dyn StoreWatcher) -> Result<()> {
        let cycle = Arc::downgrade(self);
        watcher.watch(Arc::new(move |id: &str| {
            let Some(cycle) = cycle.upgrade() else {
                return;
            };
            tracing::debug!(id = %id, "store change detected, refreshing");
            // run_once already logs failures
            let _ = cycle.run_once();
        }))
    }

    /// Closes the registry, every fetcher's store client and every resolver.
    pub fn close(&self) -> Result<()> {
        self.registry.close();
        for fetcher in &self.fetchers {
            fetcher.close()?;
        }
        self.substitution.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, MapConnector};
    use crate::domain::ConfigKey;
    use crate::ports::{BackingStoreClient, ChangeCallback};
    use crate::service::{FetcherConfig, ResolverConfig, ValueReferenceResolver};

    fn value(doc: &Document, key: &str) -> Option<String> {
        doc.get_value(&ConfigKey::parse(key).unwrap())
            .map(|v| v.as_str().to_string())
    }

    fn fetcher(store: &Arc<InMemoryStore>) -> Arc<SourceFetcher> {
        Arc::new(SourceFetcher::new(
            store.clone(),
            FetcherConfig::new(store.name().to_string()),
        ))
    }

    #[test]
    fn test_first_fetcher_wins() {
        let local = Arc::new(InMemoryStore::new("local"));
        local.put("app/application.yaml", "k: local\nonly_local: 1");
        let remote = Arc::new(InMemoryStore::new("remote"));
        remote.put("app/application.yaml", "k: remote\nonly_remote: 2");

        let registry = Arc::new(ReloadableRegistry::new());
        let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
            .with_fetcher(fetcher(&local))
            .with_fetcher(fetcher(&remote))
            .with_paths(["app"]);

        let doc = cycle.run_once().unwrap();
        assert_eq!(value(&doc, "k").as_deref(), Some("local"));
        assert_eq!(value(&doc, "only_remote").as_deref(), Some("2"));
        assert_eq!(registry.current(), Some(doc));
    }

    #[test]
    fn test_failed_cycle_keeps_last_good_value() {
        let store = Arc::new(InMemoryStore::new("mem"));
        store.put("app/application.yaml", "k: 1");
        let registry = Arc::new(ReloadableRegistry::new());
        let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
            .with_fetcher(fetcher(&store))
            .with_paths(["app"]);
        cycle.run_once().unwrap();

        store.put("app/application.yaml", "k: 2");
        store.fail_on("app/application.yaml");
        assert!(cycle.run_once().is_err());

        let current = registry.current().unwrap();
        assert_eq!(value(&current, "k").as_deref(), Some("1"));
        assert_eq!(registry.refresh_count(), 1);
    }

    #[test]
    fn test_missing_reference_aborts_cycle() {
        let store = Arc::new(InMemoryStore::new("mem"));
        store.put("app/application.yaml", "secret: ${vault://absent}");
        let vault = Arc::new(MapConnector::new("vault"));
        let registry = Arc::new(ReloadableRegistry::new());
        let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
            .with_fetcher(fetcher(&store))
            .with_substitution(ReferenceSubstitution::new().with_resolver(
                ValueReferenceResolver::new(vault, ResolverConfig::default()),
            ))
            .with_paths(["app"]);

        assert!(cycle.run_once().is_err());
        assert!(registry.current().is_none());
    }

    #[test]
    fn test_watch_with_runs_cycle_on_change() {
        #[derive(Default)]
        struct ManualWatcher {
            callback: Option<ChangeCallback>,
        }
        impl StoreWatcher for ManualWatcher {
            fn watch(&mut self, callback: ChangeCallback) -> Result<()> {
                self.callback = Some(callback);
                Ok(())
            }
            fn stop(&mut self) -> Result<()> {
                self.callback = None;
                Ok(())
            }
        }

        let store = Arc::new(InMemoryStore::new("mem"));
        store.put("app/application.yaml", "k: 1");
        let registry = Arc::new(ReloadableRegistry::new());
        let cycle = Arc::new(
            RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
                .with_fetcher(fetcher(&store))
                .with_paths(["app"]),
        );

        let mut watcher = ManualWatcher::default();
        cycle.watch_with(&mut watcher).unwrap();
        let notify = watcher.callback.clone().unwrap();

        notify("app/application.yaml");
        store.put("app/application.yaml", "k: 2");
        notify("app/application.yaml");

        assert_eq!(registry.refresh_count(), 2);
        let current = registry.current().unwrap();
        assert_eq!(value(&current, "k").as_deref(), Some("2"));
    }

    #[test]
    fn test_close_closes_stores_resolvers_and_registry() {
        let store = Arc::new(InMemoryStore::new("mem"));
        let vault = Arc::new(MapConnector::new("vault"));
        let registry = Arc::new(ReloadableRegistry::new());
        let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
            .with_fetcher(fetcher(&store))
            .with_substitution(ReferenceSubstitution::new().with_resolver(
                ValueReferenceResolver::new(vault.clone(), ResolverConfig::default()),
            ));
        cycle.close().unwrap();
        assert!(store.is_closed());
        assert!(vault.is_closed());
        assert!(registry.is_closed());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory backing store and value connector.
//!
//! Both adapters are fully functional and thread-safe. They suit embedding (a host
//! that assembles configuration in code) and tests, and they count calls so callers
//! can observe caching and batching behaviour.

use crate::domain::{ConfigError, ConfigValue, Query, Result};
use crate::ports::{BackingStoreClient, ListingEntry, ValueReferenceConnector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct StoredEntry {
    content: String,
    revision: u64,
}

/// A hierarchical store kept in memory.
///
/// Every [`put`](InMemoryStore::put) bumps the entry's revision, so cached documents
/// are invalidated exactly as an etag change would invalidate them.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::InMemoryStore;
/// use layercfg::domain::Query;
/// use layercfg::ports::BackingStoreClient;
///
/// let store = InMemoryStore::new("mem");
/// store.put("cfg/application.yaml", "a: 1");
///
/// let listing = store.listing(&Query::new("app")).unwrap();
/// assert_eq!(listing[0].id, "cfg/application.yaml");
/// assert_eq!(store.content("cfg/application.yaml").unwrap().as_deref(), Some("a: 1"));
/// assert_eq!(store.content("nope").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    next_revision: AtomicU64,
    failing: RwLock<HashSet<String>>,
    listing_calls: AtomicUsize,
    content_calls: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            next_revision: AtomicU64::new(1),
            failing: RwLock::new(HashSet::new()),
            listing_calls: AtomicUsize::new(0),
            content_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Stores content under `id`, assigning a fresh revision.
    pub fn put(&self, id: impl Into<String>, content: impl Into<String>) {
        let revision = self.next_revision.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.into(),
                StoredEntry {
                    content: content.into(),
                    revision,
                },
            );
    }

    /// Removes `id` from the store.
    pub fn remove(&self, id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Makes every `content` call for `id` fail with a transient error.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into());
    }

    /// Number of `listing` calls served so far.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Number of `content` calls served so far.
    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    /// Returns true once [`close`](BackingStoreClient::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::illegal_state(format!(
                "store '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }
}

impl BackingStoreClient for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn listing(&self, _query: &Query) -> Result<Vec<ListingEntry>> {
        self.check_open()?;
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .map(|(id, e)| ListingEntry::new(id.clone(), Some(e.revision.to_string())))
            .collect())
    }

    fn content(&self, id: &str) -> Result<Option<String>> {
        self.check_open()?;
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
        {
            return Err(ConfigError::transient(
                self.name.clone(),
                id,
                "injected store failure",
            ));
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(id).map(|e| e.content.clone()))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`ValueReferenceConnector`] backed by a static map.
///
/// Records every batch it is asked to resolve.
#[derive(Debug)]
pub struct MapConnector {
    type_tag: String,
    aliases: Vec<&'static str>,
    values: HashMap<String, ConfigValue>,
    batches: Mutex<Vec<Vec<String>>>,
    closed: AtomicBool,
}

impl MapConnector {
    /// Creates a connector with the given primary tag.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            aliases: Vec::new(),
            values: HashMap::new(),
            batches: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Adds type tag aliases.
    pub fn with_aliases(mut self, aliases: &[&'static str]) -> Self {
        self.aliases.extend_from_slice(aliases);
        self
    }

    /// Adds a known value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Batches received so far, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true once [`close`](ValueReferenceConnector::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ValueReferenceConnector for MapConnector {
    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn aliases(&self) -> &[&str] {
        &self.aliases
    }

    fn resolve_batch(&self, names: &[String]) -> Result<HashMap<String, ConfigValue>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(names.to_vec());
        Ok(names
            .iter()
            .filter_map(|n| self.values.get(n).map(|v| (n.clone(), v.clone())))
            .collect())
    }

    fn list(&self) -> Result<Option<Vec<String>>> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        Ok(Some(names))
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_bumps_revision() {
        let store = InMemoryStore::new("mem");
        store.put("a", "x: 1");
        let r1 = store.listing(&Query::default()).unwrap()[0].revision.clone();
        store.put("a", "x: 2");
        let r2 = store.listing(&Query::default()).unwrap()[0].revision.clone();
        assert_ne!(r1, r2);
        assert_eq!(store.listing_calls(), 2);
    }

    #[test]
    fn test_listing_is_sorted() {
        let store = InMemoryStore::new("mem");
        store.put("b", "");
        store.put("a", "");
        let ids: Vec<String> = store
            .listing(&Query::default())
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_injected_failure() {
        let store = InMemoryStore::new("mem");
        store.put("a", "x: 1");
        store.fail_on("a");
        let err = store.content("a").unwrap_err();
        assert!(matches!(err, ConfigError::TransientFetch { .. }));
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let store = InMemoryStore::new("mem");
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.listing(&Query::default()).is_err());
        assert!(store.content("a").is_err());
    }

    #[test]
    fn test_map_connector() {
        let connector = MapConnector::new("vault")
            .with_aliases(&["secrets"])
            .with_value("db", "pw");
        assert!(connector.supports_type("secrets"));

        let names = vec!["db".to_string(), "other".to_string()];
        let values = connector.resolve_batch(&names).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["db"].as_str(), "pw");
        assert_eq!(connector.batches(), vec![names]);
        assert_eq!(connector.list().unwrap(), Some(vec!["db".to_string()]));
    }
}

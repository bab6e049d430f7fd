// SPDX-License-Identifier: MIT OR Apache-2.0

//! Holder of the current merged document and its reloadable views.

use crate::domain::{ConfigError, ConfigKey, Document, Result};
use crate::service::reloadable::{Reloadable, WeakReloadable};
use arc_swap::ArcSwapOption;
use serde_yaml::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

struct PathView {
    key: ConfigKey,
    view: WeakReloadable<Value>,
}

impl PathView {
    fn live(&self) -> Option<Reloadable<Value>> {
        self.view.upgrade().filter(|view| !view.is_closed())
    }
}

/// Distributes refreshed documents to reloadable views.
///
/// Each [`update`](Self::update) diffs the new document against the previous one.
/// The root view and every per-path view receive a value only when what they
/// observe actually changed; a path that disappears clears its view.
///
/// Updates must be serialized by the caller.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::Document;
/// use layercfg::service::ReloadableRegistry;
///
/// let registry = ReloadableRegistry::new();
/// let host = registry.at("db.host").unwrap();
/// assert!(host.is_empty());
///
/// registry.update(Document::from_yaml_str("db: {host: primary}").unwrap()).unwrap();
/// assert_eq!(host.get().unwrap().as_str(), Some("primary"));
///
/// registry.update(Document::from_yaml_str("other: 1").unwrap()).unwrap();
/// assert!(host.is_empty());
/// ```
pub struct ReloadableRegistry {
    root: Reloadable<Document>,
    views: Mutex<Vec<PathView>>,
    current: ArcSwapOption<Document>,
    refresh_count: AtomicU64,
    closed: AtomicBool,
}

impl ReloadableRegistry {
    /// Creates a registry without a document.
    pub fn new() -> Self {
        Self {
            root: Reloadable::new(),
            views: Mutex::new(Vec::new()),
            current: ArcSwapOption::empty(),
            refresh_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// View of the whole document.
    pub fn root(&self) -> Reloadable<Document> {
        self.root.clone()
    }

    /// View of the value at a dotted `path`, present when the current document has it.
    ///
    /// The registry does not own the view: it stops being updated once every
    /// handle to it, including views derived from it, is dropped.
    pub fn at(&self, path: &str) -> Result<Reloadable<Value>> {
        self.ensure_open()?;
        let key = ConfigKey::parse(path)?;
        if key.is_root() {
            return Err(ConfigError::invalid_reference(
                path,
                "use root() to observe the whole document",
            ));
        }

        let view = Reloadable::new();
        if let Some(value) = self.current().and_then(|doc| doc.get(&key).cloned()) {
            view.update(Some(value))?;
        }
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PathView {
                key,
                view: view.downgrade(),
            });
        Ok(view)
    }

    /// Publishes `doc` as the current document.
    pub fn update(&self, doc: Document) -> Result<()> {
        self.ensure_open()?;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        self.publish(Some(doc))
    }

    /// Clears the current document; every view becomes empty.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.publish(None)
    }

    /// The current document, if any.
    pub fn current(&self) -> Option<Document> {
        self.current.load_full().map(|doc| Document::clone(&doc))
    }

    /// Number of documents published through [`update`](Self::update).
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Number of per-path views still open and referenced.
    pub fn view_count(&self) -> usize {
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        views.retain(|v| v.live().is_some());
        views.len()
    }

    /// Returns true once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the registry and every view handed out. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let views = std::mem::take(
            &mut *self.views.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for view in views.iter().filter_map(PathView::live) {
            view.close();
        }
        self.root.close();
        self.current.store(None);
        tracing::debug!("reloadable registry closed");
    }

    fn publish(&self, doc: Option<Document>) -> Result<()> {
        let previous = self.current.swap(doc.clone().map(Arc::new));

        // Snapshot the views so subscribers may create new ones while being notified.
        let views: Vec<(ConfigKey, Reloadable<Value>)> = {
            let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
            let mut live = Vec::with_capacity(views.len());
            views.retain(|v| match v.live() {
                Some(view) => {
                    live.push((v.key.clone(), view));
                    true
                }
                None => false,
            });
            live
        };

        let mut changed_views = 0usize;
        for (key, view) in &views {
            let old = previous.as_ref().and_then(|d| d.get(key));
            let new = doc.as_ref().and_then(|d| d.get(key));
            if old == new {
                continue;
            }
            changed_views += 1;
            if let Err(e) = view.update(new.cloned()) {
                // A view closed concurrently; it is pruned on the next publish.
                tracing::debug!(path = %key, error = %e, "skipping closed view");
            }
        }

        let root_changed = previous.as_deref() != doc.as_ref();
        if root_changed {
            self.root.update(doc)?;
        }

        tracing::debug!(
            root_changed,
            views = views.len(),
            changed_views,
            "published configuration"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::illegal_state("reloadable registry is closed"));
        }
        Ok(())
    }
}

impl Default for ReloadableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReloadableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadableRegistry")
            .field("current", &self.current.load_full())
            .field("refresh_count", &self.refresh_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

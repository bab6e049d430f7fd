// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reactive, hot-reloadable value container.
//!
//! A [`Reloadable`] is either empty, holds a value, or is closed for good. The
//! driver that owns it pushes new values; readers take lock-free snapshots and
//! subscribers are called synchronously, in registration order, on the thread that
//! performed the update.
//!
//! Handles are cheap to clone and share the same state.

use crate::domain::{ConfigError, Result};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Subscriber<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;
type ClearCallback = Arc<dyn Fn() + Send + Sync>;
type CloseAction = Box<dyn FnOnce() + Send>;

struct Inner<T> {
    value: ArcSwapOption<T>,
    closed: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
    clear_callbacks: Mutex<Vec<ClearCallback>>,
    close_actions: Mutex<Vec<(u64, CloseAction)>>,
}

impl<T> Inner<T> {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(sid, _)| *sid != id);
    }

    fn remove_close_action(&self, id: u64) {
        self.close_actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(aid, _)| *aid != id);
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if *self.closed.get_mut() {
            return;
        }
        // Never closed explicitly: pending close actions still run exactly once.
        let actions = mem::take(
            self.close_actions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        run_close_actions(actions);
    }
}

fn run_close_actions(actions: Vec<(u64, CloseAction)>) {
    for (_, action) in actions {
        if panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
            tracing::warn!("reloadable close action panicked");
        }
    }
}

/// A value that can be replaced at runtime and observed.
///
/// Values are handed out through [`ReloadableRegistry`](crate::service::ReloadableRegistry)
/// views; only the registry pushes updates.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::Document;
/// use layercfg::service::ReloadableRegistry;
/// use std::sync::{Arc, Mutex};
///
/// let registry = ReloadableRegistry::new();
/// let port = registry.at("server.port").unwrap().map(|v| v.as_u64().unwrap_or(0)).unwrap();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// port.register(move |p| sink.lock().unwrap().push(p.copied())).unwrap();
///
/// registry.update(Document::from_yaml_str("server: {port: 8080}").unwrap()).unwrap();
/// registry.update(Document::from_yaml_str("server: {port: 9090}").unwrap()).unwrap();
///
/// assert_eq!(port.get().unwrap(), 9090);
/// assert_eq!(*seen.lock().unwrap(), vec![Some(8080), Some(9090)]);
/// ```
pub struct Reloadable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Reloadable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Reloadable`].
pub(crate) struct WeakReloadable<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakReloadable<T> {
    /// The instance, if some handle to it is still alive.
    pub(crate) fn upgrade(&self) -> Option<Reloadable<T>> {
        self.inner.upgrade().map(|inner| Reloadable { inner })
    }
}

impl<T: Send + Sync + 'static> Reloadable<T> {
    /// Creates an open, empty instance.
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: ArcSwapOption::empty(),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                clear_callbacks: Mutex::new(Vec::new()),
                close_actions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakReloadable<T> {
        WeakReloadable {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Snapshot of the current value without cloning it.
    pub fn load(&self) -> Option<Arc<T>> {
        self.inner.value.load_full()
    }

    /// Returns true if a value is present.
    pub fn is_present(&self) -> bool {
        self.inner.value.load().is_some()
    }

    /// Returns true if no value is present.
    pub fn is_empty(&self) -> bool {
        !self.is_present()
    }

    /// Returns true once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of standing subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Calls `f` with the current value, if there is one.
    pub fn if_present<F: FnOnce(&T)>(&self, f: F) -> &Self {
        if let Some(value) = self.load() {
            f(value.as_ref());
        }
        self
    }

    /// Adds a standing subscriber.
    ///
    /// `f` receives every pushed value, or `None` when the value is cleared. If a
    /// value is present it is called right away with it.
    pub fn register<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn(Option<&T>) + Send + Sync + 'static,
    {
        self.add_subscriber(Arc::new(f))?;
        Ok(self)
    }

    /// Like [`register`](Self::register), but `f` only sees present values.
    pub fn if_present_and_register<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(move |value| {
            if let Some(value) = value {
                f(value);
            }
        })
    }

    /// Registers `f` to run whenever a present value is cleared.
    pub fn on_clear<F>(&self, f: F) -> Result<&Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut callbacks = self
            .inner
            .clear_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_open("on_clear")?;
        callbacks.push(Arc::new(f));
        Ok(self)
    }

    /// Registers `f` to run once during [`close`](Self::close), after the ones registered before it.
    ///
    /// Actions still pending when the last handle is dropped run at that point.
    pub fn on_close<F>(&self, f: F) -> Result<&Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id();
        self.push_close_action(id, Box::new(f))?;
        Ok(self)
    }

    /// Derives an instance holding `f(value)` for every value of this one.
    ///
    /// The derived instance keeps this one alive. It can be closed on its own, and
    /// closing this instance closes it too. Dropping every handle to the derived
    /// instance detaches it.
    pub fn map<U, F>(&self, f: F) -> Result<Reloadable<U>>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.derive(move |value| value.map(&f))
    }

    /// Derives an instance that holds this instance's value only while `predicate`
    /// accepts it, and is cleared otherwise.
    pub fn filter<P>(&self, predicate: P) -> Result<Reloadable<T>>
    where
        T: Clone,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.derive(move |value| value.filter(|v| predicate(*v)).cloned())
    }

    /// Closes the instance. Idempotent.
    ///
    /// Close actions run in registration order; afterwards every subscriber is dropped
    /// and registration or update calls fail with [`ConfigError::IllegalState`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let actions = mem::take(
            &mut *self
                .inner
                .close_actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        run_close_actions(actions);

        let subscribers = mem::take(
            &mut *self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let callbacks = mem::take(
            &mut *self
                .inner
                .clear_callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.inner.value.store(None);
        drop(subscribers);
        drop(callbacks);
        tracing::trace!("reloadable closed");
    }

    /// Replaces the value and notifies every subscriber on the calling thread.
    ///
    /// Subscribers are notified on every call, whether or not the value changed.
    pub(crate) fn update(&self, value: Option<T>) -> Result<()> {
        self.ensure_open("update")?;

        let value = value.map(Arc::new);
        let previous = self.inner.value.swap(value.clone());

        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in &subscribers {
            subscriber(value.as_deref());
        }

        if previous.is_some() && value.is_none() {
            let callbacks: Vec<ClearCallback> = self
                .inner
                .clear_callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for callback in &callbacks {
                callback();
            }
        }
        Ok(())
    }

    fn add_subscriber(&self, subscriber: Subscriber<T>) -> Result<u64> {
        let id = self.inner.next_id();
        self.push_subscriber(id, subscriber)?;
        Ok(id)
    }

    fn push_subscriber(&self, id: u64, subscriber: Subscriber<T>) -> Result<()> {
        {
            let mut subscribers = self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.ensure_open("register")?;
            subscribers.push((id, Arc::clone(&subscriber)));
        }
        if let Some(value) = self.load() {
            subscriber(Some(value.as_ref()));
        }
        Ok(())
    }

    fn push_close_action(&self, id: u64, action: CloseAction) -> Result<()> {
        let mut actions = self
            .inner
            .close_actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_open("on_close")?;
        actions.push((id, action));
        Ok(())
    }

    fn derive<U, F>(&self, transform: F) -> Result<Reloadable<U>>
    where
        U: Send + Sync + 'static,
        F: Fn(Option<&T>) -> Option<U> + Send + Sync + 'static,
    {
        self.ensure_open("derive")?;
        let child = Reloadable::<U>::new();
        let subscriber_id = self.inner.next_id();
        let close_id = self.inner.next_id();

        // The child owns its parent until it is closed or dropped; the parent only
        // refers back weakly.
        let parent = Arc::clone(&self.inner);
        child.on_close(move || {
            parent.remove_subscriber(subscriber_id);
            parent.remove_close_action(close_id);
        })?;

        let derived = child.downgrade();
        self.push_close_action(
            close_id,
            Box::new(move || {
                if let Some(derived) = derived.upgrade() {
                    derived.close();
                }
            }),
        )?;

        let target = child.downgrade();
        let parent = Arc::downgrade(&self.inner);
        self.push_subscriber(
            subscriber_id,
            Arc::new(move |value: Option<&T>| {
                let Some(target) = target.upgrade() else {
                    if let Some(parent) = parent.upgrade() {
                        parent.remove_subscriber(subscriber_id);
                    }
                    return;
                };
                if target.is_closed() {
                    return;
                }
                if let Err(e) = target.update(transform(value)) {
                    tracing::debug!(error = %e, "derived reloadable rejected update");
                }
            }),
        )?;

        Ok(child)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::illegal_state(format!(
                "cannot {} a closed reloadable",
                operation
            )));
        }
        Ok(())
    }
}

impl<T: Clone + Send + Sync + 'static> Reloadable<T> {
    /// Returns the current value.
    ///
    /// Fails with [`ConfigError::NotFound`] when empty and with
    /// [`ConfigError::IllegalState`] when closed.
    pub fn get(&self) -> Result<T> {
        self.ensure_open("get from")?;
        self.load()
            .map(|v| T::clone(&v))
            .ok_or_else(|| ConfigError::NotFound {
                what: "reloadable holds no value".to_string(),
            })
    }

    /// Current value or `default`.
    pub fn or_else(&self, default: T) -> T {
        self.load().map(|v| T::clone(&v)).unwrap_or(default)
    }

    /// Current value or the result of `f`.
    pub fn or_else_get<F: FnOnce() -> T>(&self, f: F) -> T {
        self.load().map(|v| T::clone(&v)).unwrap_or_else(f)
    }

    /// Current value or the not-found error; same as [`get`](Self::get).
    pub fn or_else_throw(&self) -> Result<T> {
        self.get()
    }

    /// Current value or the error built by `f`.
    pub fn or_else_throw_with<E, F: FnOnce() -> E>(&self, f: F) -> std::result::Result<T, E> {
        self.load().map(|v| T::clone(&v)).ok_or_else(f)
    }
}

impl<T: fmt::Debug> fmt::Debug for Reloadable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .map(|s| s.len())
            .unwrap_or_default();
        f.debug_struct("Reloadable")
            .field("value", &self.inner.value.load_full())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .field("subscribers", &subscribers)
            .finish()
    }
}

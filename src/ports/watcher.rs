// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store watcher trait definition.
//!
//! A [`StoreWatcher`] notices that a backing store changed and tells the host, which
//! typically reacts by running a [`RefreshCycle`](crate::service::RefreshCycle).
//! Watchers never fetch or publish configuration themselves.

use crate::domain::Result;
use std::sync::Arc;

/// Callback invoked with the store-relative id of the changed entry.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A trait for watching backing stores for changes.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::Result;
/// use layercfg::ports::{ChangeCallback, StoreWatcher};
///
/// struct NeverChanges;
///
/// impl StoreWatcher for NeverChanges {
///     fn watch(&mut self, _callback: ChangeCallback) -> Result<()> {
///         Ok(())
///     }
///
///     fn stop(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait StoreWatcher: Send + Sync {
    /// Starts watching. The callback runs on a thread owned by the watcher.
    ///
    /// Calling `watch` on a running watcher is an error.
    fn watch(&mut self, callback: ChangeCallback) -> Result<()>;

    /// Stops watching; no callback runs after this returns.
    fn stop(&mut self) -> Result<()>;
}

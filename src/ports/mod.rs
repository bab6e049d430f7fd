// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that separate the pipeline
//! from its collaborators: backing stores, reference connectors, document parsers,
//! time and change notification. Adapters implement them.

pub mod clock;
pub mod connector;
pub mod parser;
pub mod store;
pub mod watcher;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use connector::ValueReferenceConnector;
pub use parser::DocumentParser;
pub use store::{BackingStoreClient, ListingEntry};
pub use watcher::{ChangeCallback, StoreWatcher};

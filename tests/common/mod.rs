// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for integration tests.

use layercfg::prelude::*;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Builds an in-memory store holding `files`.
#[allow(dead_code)]
pub fn store(name: &str, files: &[(&str, &str)]) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new(name));
    for (id, content) in files {
        store.put(*id, *content);
    }
    store
}

/// Wraps a store in a fetcher with default settings.
#[allow(dead_code)]
pub fn fetcher(store: &Arc<InMemoryStore>) -> Arc<SourceFetcher> {
    Arc::new(SourceFetcher::new(
        store.clone(),
        FetcherConfig::new(store.name().to_string()),
    ))
}

/// Reads a leaf as a string, if present.
#[allow(dead_code)]
pub fn value(doc: &Document, key: &str) -> Option<String> {
    let key = ConfigKey::parse(key).ok()?;
    doc.get_value(&key).map(|v| v.as_str().to_string())
}

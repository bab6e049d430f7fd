// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for reloadable values and repeated refresh cycles.

mod common;

use common::{fetcher, store};
use layercfg::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_views_follow_refresh_cycles() {
    let store = store("mem", &[("app/application.yaml", "feature:\n  enabled: false\n")]);
    let registry = Arc::new(ReloadableRegistry::new());
    let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
        .with_fetcher(fetcher(&store))
        .with_paths(["app"]);

    let enabled = registry.at("feature.enabled").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    enabled
        .register(move |v| s.lock().unwrap().push(v.and_then(|v| v.as_bool())))
        .unwrap();

    cycle.run_once().unwrap();
    store.put("app/application.yaml", "feature:\n  enabled: true\n");
    cycle.run_once().unwrap();
    store.put("app/application.yaml", "other: 1\n");
    cycle.run_once().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![Some(false), Some(true), None]);
}

#[test]
fn test_unchanged_refresh_does_not_notify() {
    let store = store("mem", &[("app/application.yaml", "a: 1\nb: 2\n")]);
    let registry = Arc::new(ReloadableRegistry::new());
    let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
        .with_fetcher(fetcher(&store))
        .with_paths(["app"]);

    let a = registry.at("a").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    a.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    cycle.run_once().unwrap();
    store.put("app/application.yaml", "a: 1\nb: 3\n");
    cycle.run_once().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.refresh_count(), 2);
}

#[test]
fn test_mapped_view_tracks_source() {
    let registry = ReloadableRegistry::new();
    let port = registry.at("server.port").unwrap();
    let url = port
        .map(|v| format!("http://localhost:{}", v.as_u64().unwrap_or_default()))
        .unwrap();

    registry
        .update(Document::from_yaml_str("server: {port: 8080}").unwrap())
        .unwrap();
    assert_eq!(url.get().unwrap(), "http://localhost:8080");

    registry
        .update(Document::from_yaml_str("server: {port: 9090}").unwrap())
        .unwrap();
    assert_eq!(url.get().unwrap(), "http://localhost:9090");
}

#[test]
fn test_filtered_view_hides_rejected_values() {
    let registry = ReloadableRegistry::new();
    let workers = registry
        .at("workers")
        .unwrap()
        .map(|v| v.as_u64().unwrap_or_default())
        .unwrap()
        .filter(|n| *n > 0)
        .unwrap();

    registry.update(Document::from_yaml_str("workers: 4").unwrap()).unwrap();
    assert_eq!(workers.get().unwrap(), 4);

    registry.update(Document::from_yaml_str("workers: 0").unwrap()).unwrap();
    assert!(workers.is_empty());
    assert_eq!(workers.or_else(1), 1);
}

#[test]
fn test_failed_refresh_keeps_views() {
    let store = store("mem", &[("app/application.yaml", "k: good\n")]);
    let registry = Arc::new(ReloadableRegistry::new());
    let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
        .with_fetcher(fetcher(&store))
        .with_paths(["app"]);
    let k = registry.at("k").unwrap();

    cycle.run_once().unwrap();
    store.put("app/application.yaml", "k: [broken\n");
    assert!(cycle.run_once().is_err());

    assert_eq!(k.get().unwrap().as_str(), Some("good"));
}

#[test]
fn test_close_releases_views() {
    let store = store("mem", &[("app/application.yaml", "k: v\n")]);
    let registry = Arc::new(ReloadableRegistry::new());
    let cycle = RefreshCycle::new(Arc::clone(&registry), Query::new("app"))
        .with_fetcher(fetcher(&store))
        .with_paths(["app"]);
    let k = registry.at("k").unwrap();
    let closed = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&closed);
    k.on_close(move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    cycle.run_once().unwrap();
    cycle.close().unwrap();

    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(k.get().unwrap_err().is_illegal_state());
    assert!(store.is_closed());
}

#[test]
#[cfg(feature = "reload")]
fn test_file_watcher_triggers_refresh() {
    use layercfg::ports::StoreWatcher;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    common::init_tracing();
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("svc")).unwrap();
    fs::write(dir.path().join("svc/application.yaml"), "k: initial\n").unwrap();

    let fs_store = FilesystemStore::new(dir.path()).unwrap();
    let mut watcher =
        layercfg::adapters::FileWatcher::new(&fs_store, Some(Duration::from_millis(50))).unwrap();

    let registry = Arc::new(ReloadableRegistry::new());
    let cycle = Arc::new(
        RefreshCycle::new(Arc::clone(&registry), Query::new("svc"))
            .with_fetcher(Arc::new(SourceFetcher::new(
                Arc::new(fs_store),
                FetcherConfig::new("fs"),
            )))
            .with_paths(["svc"]),
    );
    cycle.run_once().unwrap();
    let k = registry.at("k").unwrap();
    assert_eq!(k.get().unwrap().as_str(), Some("initial"));

    cycle.watch_with(&mut watcher).unwrap();
    thread::sleep(Duration::from_millis(100));
    // Replace the file atomically so no event observes a half-written file.
    let staging = TempDir::new().unwrap();
    let staged = staging.path().join("application.yaml");
    fs::write(&staged, "k: updated value\n").unwrap();
    fs::rename(&staged, dir.path().join("svc/application.yaml")).unwrap();

    // Watch events arrive asynchronously.
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let current = k.load().and_then(|v| v.as_str().map(str::to_string));
        if current.as_deref() == Some("updated value") {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    watcher.stop().unwrap();
    assert_eq!(k.get().unwrap().as_str(), Some("updated value"));
}

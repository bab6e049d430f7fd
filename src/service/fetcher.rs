// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source fetch and merge pipeline.
//!
//! [`SourceFetcher::fetch`] turns a list of logical paths into one document:
//!
//! 1. interpolate `${...}` placeholders from the [`Query`], dropping duplicates
//! 2. expand every concrete path into primary and overlay targets with a
//!    [`DirectoryScanner`] built from a single listing call
//! 3. fetch each distinct target once, through the [`ValueCache`]
//! 4. merge overlays over their primary, then merge bases first-listed-wins

use crate::adapters::YamlParser;
use crate::domain::{ConfigError, Document, FetchTarget, Query, Result};
use crate::ports::{BackingStoreClient, Clock, DocumentParser, SystemClock};
use crate::service::cache::{ValueCache, DEFAULT_CACHE_TTL};
use crate::service::scanner::{DirectoryScanner, DEFAULT_OVERLAY_DIR, DEFAULT_PRIMARY_NAME};
use crate::service::tasks::{run_tasks, DEFAULT_MAX_WORKERS};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What to do when a logical path or target does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicy {
    /// Log a warning and continue without it
    #[default]
    Warn,
    /// Abort the whole fetch with [`ConfigError::MissingTarget`]
    Fail,
}

/// Primary document plus overlay directory convention.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OverlayConfig {
    /// Whether overlay directories are read at all
    pub enabled: bool,
    /// Name of the primary document inside a base path
    pub primary_name: String,
    /// Name of the overlay directory inside a base path
    pub overlay_dir: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_name: DEFAULT_PRIMARY_NAME.to_string(),
            overlay_dir: DEFAULT_OVERLAY_DIR.to_string(),
        }
    }
}

impl OverlayConfig {
    /// Overlay convention switched off; only primary documents are read.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn overlay_dir(&self) -> Option<&str> {
        self.enabled.then_some(self.overlay_dir.as_str())
    }
}

/// Configuration of one [`SourceFetcher`].
///
/// # Examples
///
/// ```rust
/// use layercfg::service::{FetcherConfig, MissingPolicy};
/// use std::time::Duration;
///
/// let config = FetcherConfig::from_yaml(
///     "name: s3\nparallel: true\nmissing-policy: fail\ncache-ttl-secs: 60\n",
/// )
/// .unwrap();
/// assert!(config.parallel);
/// assert_eq!(config.missing_policy, MissingPolicy::Fail);
/// assert_eq!(config.cache_ttl, Duration::from_secs(60));
/// assert_eq!(config.overlay.primary_name, "application.yaml");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Name used in logs and errors
    pub name: String,
    /// Fetch targets on a worker pool instead of the calling thread
    pub parallel: bool,
    /// Upper bound on worker threads when `parallel` is set
    pub max_workers: usize,
    /// Handling of missing paths and targets
    pub missing_policy: MissingPolicy,
    /// Overlay directory convention
    pub overlay: OverlayConfig,
    /// How long parsed documents stay cached; zero disables the cache
    #[serde(rename = "cache-ttl-secs", deserialize_with = "duration_from_secs")]
    pub cache_ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            name: "source".to_string(),
            parallel: false,
            max_workers: DEFAULT_MAX_WORKERS,
            missing_policy: MissingPolicy::default(),
            overlay: OverlayConfig::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl FetcherConfig {
    /// Creates a default configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from YAML; absent fields take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid fetcher configuration: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Sets the parallel flag.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the worker bound.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the missing-target policy.
    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    /// Sets the overlay convention.
    pub fn with_overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    /// Sets the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Fetches and merges documents from one backing store.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::InMemoryStore;
/// use layercfg::domain::{ConfigKey, Query};
/// use layercfg::service::{FetcherConfig, SourceFetcher};
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStore::new("mem"));
/// store.put("apps/billing/application.yaml", "db: {host: primary, port: 5432}");
/// store.put("apps/billing/conf.d/10-local.yaml", "db: {host: replica}");
/// store.put("shared/application.yaml", "db: {pool: 8}");
///
/// let fetcher = SourceFetcher::new(store, FetcherConfig::new("mem"));
/// let doc = fetcher
///     .fetch(&Query::new("billing"), &["apps/${application}", "shared"])
///     .unwrap();
///
/// let host = ConfigKey::parse("db.host").unwrap();
/// let pool = ConfigKey::parse("db.pool").unwrap();
/// assert_eq!(doc.get_value(&host).unwrap().as_str(), "replica");
/// assert_eq!(doc.get_value(&pool).unwrap().as_str(), "8");
/// ```
pub struct SourceFetcher {
    config: FetcherConfig,
    client: Arc<dyn BackingStoreClient>,
    parser: Arc<dyn DocumentParser>,
    cache: ValueCache<Document>,
}

impl SourceFetcher {
    /// Creates a fetcher parsing YAML content, with a system-clock cache.
    pub fn new(client: Arc<dyn BackingStoreClient>, config: FetcherConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    /// Creates a fetcher whose cache reads time from `clock`.
    pub fn with_clock(
        client: Arc<dyn BackingStoreClient>,
        config: FetcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = ValueCache::with_clock(config.cache_ttl, clock);
        Self {
            config,
            client,
            parser: Arc::new(YamlParser::new()),
            cache,
        }
    }

    /// Replaces the document parser.
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Fetcher name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Fetcher configuration.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Document cache shared by every fetch of this instance.
    pub fn cache(&self) -> &ValueCache<Document> {
        &self.cache
    }

    /// Fetches `paths` for `query` and merges them into one document.
    ///
    /// Earlier paths take precedence over later ones. Within one path, overlays
    /// override the primary document and later-sorted overlays override earlier ones.
    pub fn fetch<S: AsRef<str>>(&self, query: &Query, paths: &[S]) -> Result<Document> {
        let bases = query.interpolate_all(paths)?;
        if bases.is_empty() {
            tracing::debug!(fetcher = %self.name(), "no paths to fetch");
            return Ok(Document::empty());
        }

        let scanner = DirectoryScanner::new(self.client.as_ref(), query)?;
        let overlay = &self.config.overlay;

        let mut scanned = Vec::with_capacity(bases.len());
        for base in &bases {
            let expanded = scanner.expand(base, &overlay.primary_name, overlay.overlay_dir());
            if expanded.is_empty() {
                self.handle_missing(base)?;
                continue;
            }
            scanned.push(expanded);
        }

        // Stable dedup: a target shared by two bases is fetched once.
        let mut seen = HashSet::new();
        let targets: Vec<FetchTarget> = scanned
            .iter()
            .flat_map(|s| s.targets())
            .filter(|t| seen.insert(t.id().to_string()))
            .cloned()
            .collect();

        tracing::debug!(
            fetcher = %self.name(),
            paths = bases.len(),
            targets = targets.len(),
            parallel = self.config.parallel,
            "fetching targets"
        );

        let loaded = run_tasks(
            &targets,
            self.config.parallel,
            self.config.max_workers,
            |target| self.load(target),
        )?;
        let documents: HashMap<&str, Document> = targets
            .iter()
            .zip(loaded)
            .filter_map(|(target, doc)| doc.map(|d| (target.id(), d)))
            .collect();

        let per_base: Vec<Document> = scanned
            .iter()
            .map(|s| {
                // Reverse so the last overlay is merged first and wins.
                let layers: Vec<&Document> = s
                    .targets()
                    .filter_map(|t| documents.get(t.id()))
                    .collect();
                Document::merge_all(layers.into_iter().rev())
            })
            .collect();

        Ok(Document::merge_all(per_base.iter()))
    }

    /// Closes the underlying store client.
    pub fn close(&self) -> Result<()> {
        self.client.close()
    }

    fn load(&self, target: &FetchTarget) -> Result<Option<Document>> {
        let key = target.cache_key()?;
        if let Some(doc) = self.cache.get(&key) {
            tracing::debug!(fetcher = %self.name(), target = %target, "using cached document");
            return Ok(Some(doc));
        }

        let Some(content) = self.client.content(target.id())? else {
            self.handle_missing(target.id())?;
            return Ok(None);
        };

        let doc = self.parser.parse(&content).map_err(|e| match e {
            ConfigError::ParseError { message, source } => ConfigError::ParseError {
                message: format!("{} (in '{}' from '{}')", message, target.id(), self.name()),
                source,
            },
            other => other,
        })?;
        self.cache.put(&key, doc.clone());
        tracing::debug!(
            fetcher = %self.name(),
            target = %target,
            keys = doc.as_mapping().len(),
            "fetched document"
        );
        Ok(Some(doc))
    }

    fn handle_missing(&self, target: &str) -> Result<()> {
        match self.config.missing_policy {
            MissingPolicy::Warn => {
                tracing::warn!(
                    fetcher = %self.name(),
                    target = %target,
                    "configuration location does not exist, skipping"
                );
                Ok(())
            }
            MissingPolicy::Fail => Err(ConfigError::MissingTarget {
                source_name: self.name().to_string(),
                target: target.to_string(),
            }),
        }
    }
}

impl fmt::Debug for SourceFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFetcher")
            .field("config", &self.config)
            .field("store", &self.client.name())
            .field("cache", &self.cache)
            .finish()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched resolution of external value references.
//!
//! A [`ValueReferenceResolver`] wraps one [`ValueReferenceConnector`] and turns a list
//! of names into values, splitting the work into backing-store-sized batches.
//! [`ConnectorRegistry`] maps type tags to connector factories, and
//! [`ReferenceSubstitution`] replaces `${tag://name}` leaves of a document with the
//! values the matching resolvers return.

use crate::domain::{ConfigError, ConfigValue, Document, Result, ValueReference};
use crate::ports::ValueReferenceConnector;
use crate::service::tasks::{run_tasks, DEFAULT_MAX_WORKERS};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default maximum number of names per connector call.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Configuration of one [`ValueReferenceResolver`].
///
/// # Examples
///
/// ```rust
/// use layercfg::service::ResolverConfig;
///
/// let config = ResolverConfig::from_yaml("name: ssm\nallow-missing: true\nbatch-size: 5\n").unwrap();
/// assert!(config.allow_missing);
/// assert_eq!(config.batch_size, 5);
/// assert!(!config.parallel);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Name used in logs and errors; defaults to the connector's type tag when empty
    pub name: String,
    /// Omit unknown names instead of failing
    pub allow_missing: bool,
    /// Resolve batches on a worker pool instead of the calling thread
    pub parallel: bool,
    /// Upper bound on worker threads when `parallel` is set
    pub max_workers: usize,
    /// Maximum number of names per connector call
    pub batch_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            allow_missing: false,
            parallel: false,
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ResolverConfig {
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
            message: format!("Invalid resolver configuration: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Sets the allow-missing flag.
    pub fn with_allow_missing(mut self, allow_missing: bool) -> Self {
        self.allow_missing = allow_missing;
        self
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

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Resolves names through one connector in capped batches.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::MapConnector;
/// use layercfg::service::{ResolverConfig, ValueReferenceResolver};
/// use std::sync::Arc;
///
/// let connector = Arc::new(MapConnector::new("vault").with_value("db", "secret"));
/// let resolver = ValueReferenceResolver::new(connector, ResolverConfig::default());
///
/// let values = resolver.resolve(&["db", "db"]).unwrap();
/// assert_eq!(values["db"].as_str(), "secret");
/// assert!(resolver.resolve(&["unknown"]).is_err());
/// ```
pub struct ValueReferenceResolver {
    name: String,
    config: ResolverConfig,
    connector: Arc<dyn ValueReferenceConnector>,
    type_tags: Vec<String>,
    closed: AtomicBool,
}

impl ValueReferenceResolver {
    /// Creates a resolver over `connector`, answering to the connector's tag and aliases.
    pub fn new(connector: Arc<dyn ValueReferenceConnector>, config: ResolverConfig) -> Self {
        let name = if config.name.trim().is_empty() {
            connector.type_tag().to_string()
        } else {
            config.name.clone()
        };
        let mut type_tags = vec![connector.type_tag().to_string()];
        type_tags.extend(connector.aliases().iter().map(|a| a.to_string()));
        Self {
            name,
            config,
            connector,
            type_tags,
            closed: AtomicBool::new(false),
        }
    }

    /// Adds tags this resolver answers to besides the connector's own.
    pub fn with_type_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.type_tags.contains(&tag) {
                self.type_tags.push(tag);
            }
        }
        self
    }

    /// Resolver name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Primary type tag of the connector.
    pub fn type_tag(&self) -> &str {
        self.connector.type_tag()
    }

    /// Every tag this resolver answers to, primary tag first.
    pub fn type_tags(&self) -> &[String] {
        &self.type_tags
    }

    /// Returns true if `type_tag` is one of this resolver's tags.
    pub fn supports_type(&self, type_tag: &str) -> bool {
        self.type_tags.iter().any(|t| t == type_tag)
    }

    /// Every name the connector knows, if it supports discovery.
    pub fn list(&self) -> Result<Option<Vec<String>>> {
        self.ensure_open()?;
        self.connector.list()
    }

    /// Returns true once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the connector. Idempotent; later calls to `resolve` fail with
    /// [`ConfigError::IllegalState`].
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(resolver = %self.name, "closing value reference resolver");
        self.connector.close()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::illegal_state(format!(
                "resolver '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolves `names`, deduplicated in first-occurrence order.
    ///
    /// Names the connector does not return are omitted when `allow_missing` is set;
    /// otherwise the call fails with [`ConfigError::MissingReferences`].
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<HashMap<String, ConfigValue>> {
        self.ensure_open()?;
        let mut seen = HashSet::new();
        let unique: Vec<String> = names
            .iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| seen.insert(n.clone()))
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let batches: Vec<Vec<String>> = unique
            .chunks(self.config.batch_size.max(1))
            .map(<[String]>::to_vec)
            .collect();
        tracing::debug!(
            resolver = %self.name,
            names = unique.len(),
            batches = batches.len(),
            parallel = self.config.parallel,
            "resolving value references"
        );

        let results = run_tasks(
            &batches,
            self.config.parallel,
            self.config.max_workers,
            |batch| self.connector.resolve_batch(batch),
        )?;

        let mut resolved = HashMap::with_capacity(unique.len());
        for batch_result in results {
            for (name, value) in batch_result {
                // Connectors may return extra names; keep only what was asked for.
                if seen.contains(&name) {
                    resolved.insert(name, value);
                }
            }
        }

        let missing: Vec<String> = unique
            .into_iter()
            .filter(|n| !resolved.contains_key(n))
            .collect();
        if !missing.is_empty() {
            if !self.config.allow_missing {
                return Err(ConfigError::MissingReferences {
                    resolver: self.name.clone(),
                    names: missing,
                });
            }
            tracing::debug!(
                resolver = %self.name,
                missing = ?missing,
                "omitting unresolved references"
            );
        }
        Ok(resolved)
    }
}

impl fmt::Debug for ValueReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueReferenceResolver")
            .field("name", &self.name)
            .field("type_tags", &self.type_tags)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builds a connector on demand.
pub type ConnectorFactory =
    Arc<dyn Fn() -> Result<Arc<dyn ValueReferenceConnector>> + Send + Sync>;

struct RegisteredConnector {
    type_tag: String,
    aliases: Vec<String>,
    factory: ConnectorFactory,
}

impl RegisteredConnector {
    fn build(&self, config: ResolverConfig) -> Result<ValueReferenceResolver> {
        let connector = (self.factory)()?;
        let tags = std::iter::once(&self.type_tag).chain(&self.aliases).cloned();
        Ok(ValueReferenceResolver::new(connector, config).with_type_tags(tags))
    }
}

/// Explicit table of connector factories, keyed by type tag and aliases.
///
/// Populated by the host at startup; there is no global registry.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::MapConnector;
/// use layercfg::ports::ValueReferenceConnector;
/// use layercfg::service::{ConnectorRegistry, ResolverConfig};
/// use std::sync::Arc;
///
/// let mut registry = ConnectorRegistry::new();
/// registry
///     .register("vault", &["secrets"], || {
///         let connector: Arc<dyn ValueReferenceConnector> =
///             Arc::new(MapConnector::new("vault").with_value("token", "t0k3n"));
///         Ok(connector)
///     })
///     .unwrap();
///
/// let resolver = registry.create_resolver("secrets", ResolverConfig::default()).unwrap();
/// assert_eq!(resolver.resolve(&["token"]).unwrap()["token"].as_str(), "t0k3n");
/// ```
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: Vec<RegisteredConnector>,
    by_tag: HashMap<String, usize>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `type_tag` and `aliases`.
    ///
    /// Fails with [`ConfigError::IllegalState`] if any tag is already taken.
    pub fn register<F>(&mut self, type_tag: &str, aliases: &[&str], factory: F) -> Result<&mut Self>
    where
        F: Fn() -> Result<Arc<dyn ValueReferenceConnector>> + Send + Sync + 'static,
    {
        let mut tags = vec![type_tag.to_string()];
        tags.extend(aliases.iter().map(|a| a.to_string()));

        let mut unique = HashSet::new();
        for tag in &tags {
            if tag.trim().is_empty() {
                return Err(ConfigError::invalid_reference(
                    tag.clone(),
                    "connector type tags must not be empty",
                ));
            }
            if self.by_tag.contains_key(tag) || !unique.insert(tag.as_str()) {
                return Err(ConfigError::illegal_state(format!(
                    "connector type tag '{}' is already registered",
                    tag
                )));
            }
        }

        let index = self.connectors.len();
        for tag in &tags {
            self.by_tag.insert(tag.clone(), index);
        }
        self.connectors.push(RegisteredConnector {
            type_tag: type_tag.to_string(),
            aliases: tags[1..].to_vec(),
            factory: Arc::new(factory),
        });
        tracing::debug!(type_tag = %type_tag, aliases = ?aliases, "registered connector");
        Ok(self)
    }

    /// Registers an existing connector instance under its own tag and aliases.
    pub fn register_connector(
        &mut self,
        connector: Arc<dyn ValueReferenceConnector>,
    ) -> Result<&mut Self> {
        let type_tag = connector.type_tag().to_string();
        let aliases: Vec<String> = connector.aliases().iter().map(|a| a.to_string()).collect();
        let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
        self.register(&type_tag, &alias_refs, move || Ok(Arc::clone(&connector)))
    }

    /// Returns true if `type_tag` is a registered tag or alias.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.by_tag.contains_key(type_tag)
    }

    /// Primary type tags in registration order.
    pub fn type_tags(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.type_tag.as_str()).collect()
    }

    /// Builds a connector through the factory registered for `type_tag`.
    pub fn create_connector(&self, type_tag: &str) -> Result<Arc<dyn ValueReferenceConnector>> {
        let registered = self.lookup(type_tag)?;
        (registered.factory)()
    }

    /// Builds a resolver for `type_tag` with `config`.
    ///
    /// The resolver answers to every tag and alias the connector was registered under.
    pub fn create_resolver(
        &self,
        type_tag: &str,
        config: ResolverConfig,
    ) -> Result<ValueReferenceResolver> {
        self.lookup(type_tag)?.build(config)
    }

    /// Builds one resolver per registered connector, all sharing `config`.
    pub fn create_all(&self, config: &ResolverConfig) -> Result<Vec<ValueReferenceResolver>> {
        self.connectors
            .iter()
            .map(|registered| registered.build(config.clone()))
            .collect()
    }

    fn lookup(&self, type_tag: &str) -> Result<&RegisteredConnector> {
        self.by_tag
            .get(type_tag)
            .map(|&i| &self.connectors[i])
            .ok_or_else(|| ConfigError::NotFound {
                what: format!("connector for type tag '{}'", type_tag),
            })
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.connectors
                    .iter()
                    .map(|c| (c.type_tag.as_str(), c.aliases.as_slice())),
            )
            .finish()
    }
}

/// Replaces `${tag://name}` leaves of a document with resolved values.
///
/// References are grouped per resolver so every resolver is called once per
/// document. References with an unregistered tag are left as they are; references
/// a resolver omitted under `allow_missing` are removed.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::MapConnector;
/// use layercfg::domain::{ConfigKey, Document};
/// use layercfg::service::{ReferenceSubstitution, ResolverConfig, ValueReferenceResolver};
/// use std::sync::Arc;
///
/// let connector = Arc::new(MapConnector::new("vault").with_value("db/password", "hunter2"));
/// let substitution = ReferenceSubstitution::new()
///     .with_resolver(ValueReferenceResolver::new(connector, ResolverConfig::default()));
///
/// let doc = Document::from_yaml_str("db:\n  password: ${vault://db/password}\n").unwrap();
/// let resolved = substitution.apply(&doc).unwrap();
/// let key = ConfigKey::parse("db.password").unwrap();
/// assert_eq!(resolved.get_value(&key).unwrap().as_str(), "hunter2");
/// ```
#[derive(Debug, Default)]
pub struct ReferenceSubstitution {
    resolvers: Vec<ValueReferenceResolver>,
}

impl ReferenceSubstitution {
    /// Creates a substitution without resolvers; it leaves documents unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a substitution with one resolver per registered connector.
    pub fn from_registry(registry: &ConnectorRegistry, config: &ResolverConfig) -> Result<Self> {
        Ok(Self {
            resolvers: registry.create_all(config)?,
        })
    }

    /// Adds a resolver. Earlier resolvers win when several support the same tag.
    pub fn with_resolver(mut self, resolver: ValueReferenceResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Returns true if no resolver is configured.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Closes every resolver, reporting the first failure after trying all of them.
    pub fn close(&self) -> Result<()> {
        let mut first_error = None;
        for resolver in &self.resolvers {
            if let Err(e) = resolver.close() {
                tracing::warn!(resolver = %resolver.name(), error = %e, "failed to close resolver");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Resolves every reference in `doc` and returns the substituted document.
    pub fn apply(&self, doc: &Document) -> Result<Document> {
        let mut references = Vec::new();
        for value in doc.as_mapping().values() {
            collect_references(value, &mut references);
        }
        if references.is_empty() || self.resolvers.is_empty() {
            return Ok(doc.clone());
        }

        let mut names_per_resolver: Vec<Vec<&str>> = vec![Vec::new(); self.resolvers.len()];
        for reference in &references {
            match self.resolver_index(reference.type_tag()) {
                Some(i) => names_per_resolver[i].push(reference.name()),
                None => tracing::debug!(
                    reference = %reference,
                    "no resolver for reference type, leaving it untouched"
                ),
            }
        }

        let mut resolved = Vec::with_capacity(self.resolvers.len());
        for (resolver, names) in self.resolvers.iter().zip(&names_per_resolver) {
            resolved.push(if names.is_empty() {
                HashMap::new()
            } else {
                resolver.resolve(names)?
            });
        }

        let mut root = Mapping::with_capacity(doc.as_mapping().len());
        for (key, value) in doc.as_mapping() {
            if let Some(value) = self.substitute(value, &resolved) {
                root.insert(key.clone(), value);
            }
        }
        tracing::debug!(references = references.len(), "substituted value references");
        Ok(Document::from_mapping(root))
    }

    fn resolver_index(&self, type_tag: &str) -> Option<usize> {
        self.resolvers.iter().position(|r| r.supports_type(type_tag))
    }

    /// Returns `None` when the value must be dropped.
    fn substitute(&self, value: &Value, resolved: &[HashMap<String, ConfigValue>]) -> Option<Value> {
        match value {
            Value::String(raw) => {
                let Some(reference) = ValueReference::parse(raw) else {
                    return Some(value.clone());
                };
                match self.resolver_index(reference.type_tag()) {
                    Some(i) => resolved[i].get(reference.name()).map(ConfigValue::to_yaml),
                    None => Some(value.clone()),
                }
            }
            Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    if let Some(v) = self.substitute(v, resolved) {
                        out.insert(k.clone(), v);
                    }
                }
                Some(Value::Mapping(out))
            }
            Value::Sequence(items) => Some(Value::Sequence(
                items
                    .iter()
                    .filter_map(|item| self.substitute(item, resolved))
                    .collect(),
            )),
            Value::Tagged(tagged) => self.substitute(&tagged.value, resolved),
            other => Some(other.clone()),
        }
    }
}

fn collect_references(value: &Value, out: &mut Vec<ValueReference>) {
    match value {
        Value::String(raw) => out.extend(ValueReference::parse(raw)),
        Value::Mapping(map) => map.values().for_each(|v| collect_references(v, out)),
        Value::Sequence(items) => items.iter().for_each(|v| collect_references(v, out)),
        Value::Tagged(tagged) => collect_references(&tagged.value, out),
        _ => {}
    }
}

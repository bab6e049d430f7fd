// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable hierarchical configuration document.
//!
//! A [`Document`] is the unit of merge. It wraps a YAML mapping tree behind an
//! `Arc`, so clones are cheap and every merge produces a new document rather than
//! touching an existing one.

use crate::domain::config_key::ConfigKey;
use crate::domain::config_value::ConfigValue;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An immutable key-value tree.
///
/// # Examples
///
/// ```
/// use layercfg::domain::{ConfigKey, Document};
///
/// let primary = Document::from_yaml_str("a: 1\nb: 1").unwrap();
/// let fallback = Document::from_yaml_str("b: 2\nc: 3").unwrap();
///
/// let merged = primary.with_fallback(&fallback);
/// let b = merged.get_value(&ConfigKey::parse("b").unwrap()).unwrap();
/// assert_eq!(b.as_str(), "1");
/// assert_eq!(merged.keys().len(), 3);
/// ```
#[derive(Clone, PartialEq, Default)]
pub struct Document {
    root: Arc<Mapping>,
}

impl Document {
    /// Creates an empty document.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps a parsed mapping.
    pub fn from_mapping(root: Mapping) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// Parses YAML text. Convenience for tests and embedders; pipelines go through a
    /// [`DocumentParser`](crate::ports::DocumentParser).
    pub fn from_yaml_str(content: &str) -> crate::domain::Result<Self> {
        use crate::ports::DocumentParser;
        crate::adapters::YamlParser::new().parse(content)
    }

    /// Returns the root mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Returns true if the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Looks up the node at `key`; the root key yields `None`.
    ///
    /// Sequence elements are addressed by index, matching [`flatten`](Self::flatten).
    pub fn get(&self, key: &ConfigKey) -> Option<&Value> {
        let mut segments = key.segments();
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = child(node, segment)?;
        }
        Some(node)
    }

    /// Returns the scalar at `key`, if any.
    pub fn get_value(&self, key: &ConfigKey) -> Option<ConfigValue> {
        self.get(key).and_then(ConfigValue::from_yaml)
    }

    /// Returns the node at `key` as a document; a missing or non-mapping node yields
    /// an empty document.
    pub fn at_path(&self, key: &ConfigKey) -> Document {
        if key.is_root() {
            return self.clone();
        }
        match self.get(key) {
            Some(Value::Mapping(m)) => Document::from_mapping(m.clone()),
            _ => Document::empty(),
        }
    }

    /// Returns a new document with `value` stored at `key`, creating intermediate
    /// mappings and replacing any non-mapping node on the way.
    pub fn with_value(&self, key: &ConfigKey, value: Value) -> Document {
        let segments: Vec<&str> = key.segments().collect();
        if segments.is_empty() {
            return match value {
                Value::Mapping(m) => Document::from_mapping(m),
                _ => self.clone(),
            };
        }
        let mut root = (*self.root).clone();
        insert_path(&mut root, &segments, value);
        Document::from_mapping(root)
    }

    /// Returns a new document with the node at `key` removed.
    pub fn without(&self, key: &ConfigKey) -> Document {
        let segments: Vec<&str> = key.segments().collect();
        if segments.is_empty() {
            return Document::empty();
        }
        let mut root = (*self.root).clone();
        remove_path(&mut root, &segments);
        Document::from_mapping(root)
    }

    /// Fallback merge: keys in `self` win, `other` only fills what is absent.
    /// Nested mappings are merged recursively.
    pub fn with_fallback(&self, other: &Document) -> Document {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Document::from_mapping(merge_mappings(&self.root, &other.root))
    }

    /// Merges documents so that the first one listed has the highest precedence.
    pub fn merge_all<'a, I>(docs: I) -> Document
    where
        I: IntoIterator<Item = &'a Document>,
    {
        docs.into_iter()
            .fold(Document::empty(), |acc, doc| acc.with_fallback(doc))
    }

    /// Flattens every leaf into dot-notation keys; sequences use their index.
    pub fn flatten(&self) -> BTreeMap<String, ConfigValue> {
        let mut result = BTreeMap::new();
        for (key, val) in self.root.iter() {
            if let Some(key) = key_str(key) {
                flatten_value(val, &key, &mut result);
            }
        }
        result
    }

    /// Returns every leaf key in dot notation, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.flatten().into_keys().collect()
    }
}

impl From<Mapping> for Document {
    fn from(root: Mapping) -> Self {
        Document::from_mapping(root)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.flatten()).finish()
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => seq.get(segment.parse::<usize>().ok()?),
        Value::Tagged(tagged) => child(&tagged.value, segment),
        _ => None,
    }
}

fn key_str(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn merge_mappings(primary: &Mapping, fallback: &Mapping) -> Mapping {
    let mut merged = primary.clone();
    for (key, fallback_val) in fallback.iter() {
        match merged.get_mut(key) {
            Some(Value::Mapping(primary_map)) => {
                if let Value::Mapping(fallback_map) = fallback_val {
                    *primary_map = merge_mappings(primary_map, fallback_map);
                }
            }
            Some(_) => {}
            None => {
                merged.insert(key.clone(), fallback_val.clone());
            }
        }
    }
    merged
}

fn insert_path(map: &mut Mapping, segments: &[&str], value: Value) {
    let key = Value::String(segments[0].to_string());
    if segments.len() == 1 {
        map.insert(key, value);
        return;
    }
    let child = map
        .entry(key)
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !child.is_mapping() {
        *child = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(child_map) = child {
        insert_path(child_map, &segments[1..], value);
    }
}

fn remove_path(map: &mut Mapping, segments: &[&str]) {
    if segments.len() == 1 {
        map.remove(segments[0]);
        return;
    }
    if let Some(Value::Mapping(child)) = map.get_mut(segments[0]) {
        remove_path(child, &segments[1..]);
    }
}

fn flatten_value(value: &Value, prefix: &str, result: &mut BTreeMap<String, ConfigValue>) {
    match value {
        Value::Mapping(map) => {
            for (key, val) in map {
                if let Some(key) = key_str(key) {
                    flatten_value(val, &format!("{}.{}", prefix, key), result);
                }
            }
        }
        Value::Sequence(seq) => {
            for (i, val) in seq.iter().enumerate() {
                flatten_value(val, &format!("{}.{}", prefix, i), result);
            }
        }
        Value::Tagged(tagged) => flatten_value(&tagged.value, prefix, result),
        scalar => {
            if let Some(v) = ConfigValue::from_yaml(scalar) {
                result.insert(prefix.to_string(), v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml_str(yaml).unwrap()
    }

    fn key(k: &str) -> ConfigKey {
        ConfigKey::parse(k).unwrap()
    }

    #[test]
    fn test_get_indexes_into_sequences() {
        let d = doc("hosts:\n  - a\n  - {name: b}\n");
        assert_eq!(d.keys(), vec!["hosts.0", "hosts.1.name"]);
        assert_eq!(d.get_value(&key("hosts.0")).unwrap().as_str(), "a");
        assert_eq!(d.get_value(&key("hosts.1.name")).unwrap().as_str(), "b");
        assert!(d.get(&key("hosts.2")).is_none());
        assert!(d.get(&key("hosts.x")).is_none());
    }

    #[test]
    fn test_get_sees_through_tags() {
        let d = doc("list: !custom\n  - tagged\n");
        assert_eq!(d.get_value(&key("list.0")).unwrap().as_str(), "tagged");
    }

    #[test]
    fn test_first_document_wins_on_conflict() {
        let d1 = doc("a: 1\nshared: from-d1");
        let d2 = doc("b: 2\nshared: from-d2");

        let merged = Document::merge_all([&d1, &d2]);
        assert_eq!(merged.get_value(&key("shared")).unwrap().as_str(), "from-d1");
        assert_eq!(merged.get_value(&key("a")).unwrap().as_str(), "1");
        assert_eq!(merged.get_value(&key("b")).unwrap().as_str(), "2");
    }

    #[test]
    fn test_nested_mappings_merge_recursively() {
        let d1 = doc("db:\n  host: primary\n");
        let d2 = doc("db:\n  host: fallback\n  port: 5432\n");

        let merged = d1.with_fallback(&d2);
        assert_eq!(merged.get_value(&key("db.host")).unwrap().as_str(), "primary");
        assert_eq!(merged.get_value(&key("db.port")).unwrap().as_str(), "5432");
    }

    #[test]
    fn test_scalar_blocks_fallback_mapping() {
        let d1 = doc("db: disabled");
        let d2 = doc("db:\n  host: x\n");

        let merged = d1.with_fallback(&d2);
        assert_eq!(merged.get_value(&key("db")).unwrap().as_str(), "disabled");
        assert!(merged.get(&key("db.host")).is_none());
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let d1 = doc("a: 1");
        let d2 = doc("b: 2");
        let _ = d1.with_fallback(&d2);
        assert_eq!(d1.keys(), vec!["a".to_string()]);
        assert_eq!(d2.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_flatten_sequences_and_nulls() {
        let d = doc("hosts:\n  - a\n  - b\nempty: ~\n");
        let flat = d.flatten();
        assert_eq!(flat["hosts.0"].as_str(), "a");
        assert_eq!(flat["hosts.1"].as_str(), "b");
        assert_eq!(flat["empty"].as_str(), "");
    }

    #[test]
    fn test_at_path_and_with_value() {
        let d = doc("db:\n  host: h\n");
        assert_eq!(d.at_path(&key("db")).keys(), vec!["host".to_string()]);
        assert!(d.at_path(&key("db.host")).is_empty());
        assert!(d.at_path(&key("missing")).is_empty());

        let updated = d.with_value(&key("db.port"), Value::from(1));
        assert_eq!(updated.get_value(&key("db.port")).unwrap().as_str(), "1");
        assert!(d.get(&key("db.port")).is_none());
    }

    #[test]
    fn test_with_value_replaces_scalar_parent() {
        let d = doc("db: off\n");
        let updated = d.with_value(&key("db.host"), Value::from("h"));
        assert_eq!(updated.get_value(&key("db.host")).unwrap().as_str(), "h");
    }

    #[test]
    fn test_without() {
        let d = doc("db:\n  host: h\n  port: 1\n");
        let trimmed = d.without(&key("db.port"));
        assert_eq!(trimmed.keys(), vec!["db.host".to_string()]);
    }

    #[test]
    fn test_get_root_is_none() {
        assert!(doc("a: 1").get(&ConfigKey::root()).is_none());
    }
}

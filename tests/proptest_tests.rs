// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based tests using proptest.
//!
//! These tests check merge precedence, path interpolation, reference parsing and
//! batched resolution against arbitrary inputs.

use layercfg::adapters::MapConnector;
use layercfg::domain::{ConfigKey, Document, Query, ValueReference};
use layercfg::service::{ResolverConfig, ValueReferenceResolver};
use proptest::prelude::*;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

fn doc_from(entries: &BTreeMap<String, String>) -> Document {
    let mut mapping = Mapping::new();
    for (k, v) in entries {
        mapping.insert(Value::String(k.clone()), Value::String(v.clone()));
    }
    Document::from_mapping(mapping)
}

// Test that the first document wins every key it defines
proptest! {
    #[test]
    fn test_merge_first_document_wins(
        first in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..8),
        second in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..8),
    ) {
        let merged = Document::merge_all([doc_from(&first), doc_from(&second)].iter());

        for (k, v) in &first {
            let key = ConfigKey::parse(k.as_str()).unwrap();
            prop_assert_eq!(merged.get_value(&key).map(String::from), Some(v.clone()));
        }
        for (k, v) in &second {
            if !first.contains_key(k) {
                let key = ConfigKey::parse(k.as_str()).unwrap();
                prop_assert_eq!(merged.get_value(&key).map(String::from), Some(v.clone()));
            }
        }

        let expected: HashSet<&String> = first.keys().chain(second.keys()).collect();
        prop_assert_eq!(merged.keys().len(), expected.len());
    }
}

// Test that merging with an empty document is the identity
proptest! {
    #[test]
    fn test_merge_with_empty_is_identity(
        entries in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,8}", 0..8),
    ) {
        let doc = doc_from(&entries);
        prop_assert_eq!(doc.with_fallback(&Document::empty()), doc.clone());
        prop_assert_eq!(Document::empty().with_fallback(&doc), doc);
    }
}

// Test that interpolation keeps first-seen order and drops duplicates
proptest! {
    #[test]
    fn test_interpolate_all_dedups_in_order(
        paths in prop::collection::vec("[a-z]{1,3}(/[a-z]{1,3}){0,2}", 0..12),
    ) {
        let query = Query::new("app");
        let result = query.interpolate_all(&paths).unwrap();

        let mut expected: Vec<String> = Vec::new();
        for p in &paths {
            if !expected.contains(p) {
                expected.push(p.clone());
            }
        }
        prop_assert_eq!(result, expected);
    }
}

// Test that every environment produces one path, in query order
proptest! {
    #[test]
    fn test_env_expansion_follows_query_order(
        envs in prop::collection::vec("[a-z]{1,5}", 1..5),
    ) {
        let query = Query::new("app").with_envs(envs.clone());
        let result = query.interpolate("cfg/${env}").unwrap();
        let expected: Vec<String> = envs.iter().map(|e| format!("cfg/{}", e)).collect();
        prop_assert_eq!(result, expected);
    }
}

// Test that a formatted reference parses back to itself
proptest! {
    #[test]
    fn test_reference_display_parses_back(
        tag in "[a-z][a-z0-9_.\\-]{0,8}",
        name in "[A-Za-z0-9_/\\-]{1,16}",
    ) {
        let reference = ValueReference::new(tag.clone(), name.clone());
        let parsed = ValueReference::parse(&reference.to_string());
        prop_assert_eq!(parsed, Some(reference));
    }
}

// Test that plain values are never mistaken for references
proptest! {
    #[test]
    fn test_plain_values_are_not_references(s in "[^$]*") {
        prop_assert!(ValueReference::parse(&s).is_none());
    }
}

// Test that names are deduplicated and batched by the configured size
proptest! {
    #[test]
    fn test_resolver_batches_unique_names(
        names in prop::collection::vec("n[0-9]{1,2}", 0..40),
        batch_size in 1usize..8,
    ) {
        let mut connector = MapConnector::new("map");
        for n in &names {
            connector = connector.with_value(n.clone(), n.to_uppercase());
        }
        let connector = Arc::new(connector);
        let resolver = ValueReferenceResolver::new(
            connector.clone(),
            ResolverConfig::default().with_batch_size(batch_size),
        );

        let resolved = resolver.resolve(&names).unwrap();

        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(resolved.len(), unique.len());

        let batches = connector.batches();
        prop_assert_eq!(batches.len(), unique.len().div_ceil(batch_size));
        prop_assert!(batches.iter().all(|b| b.len() <= batch_size));
        let total: usize = batches.iter().map(Vec::len).sum();
        prop_assert_eq!(total, unique.len());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variable value connector.
//!
//! Resolves `${env://NAME}` references from the process environment.

use crate::domain::{ConfigValue, Result};
use crate::ports::ValueReferenceConnector;
use std::collections::HashMap;
use std::env;

/// Maximum length for environment variable keys (prevents DoS)
const MAX_ENV_KEY_LEN: usize = 512;

/// Maximum length for environment variable values (prevents DoS)
const MAX_ENV_VALUE_LEN: usize = 1048576; // 1MB

/// [`ValueReferenceConnector`] reading the process environment.
///
/// An optional prefix is prepended to every requested name, so `${env://DB_PASSWORD}`
/// with prefix `MYAPP_` reads `MYAPP_DB_PASSWORD`.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::EnvVarConnector;
/// use layercfg::ports::ValueReferenceConnector;
/// use std::collections::HashMap;
///
/// let mut values = HashMap::new();
/// values.insert("HOME".to_string(), "/root".to_string());
/// let connector = EnvVarConnector::with_values(values);
///
/// let resolved = connector.resolve_batch(&["HOME".to_string()]).unwrap();
/// assert_eq!(resolved["HOME"].as_str(), "/root");
/// assert!(connector.supports_type("environment"));
/// ```
#[derive(Debug, Default)]
pub struct EnvVarConnector {
    /// Prefix prepended to requested names
    prefix: Option<String>,
    /// Fixed values used instead of the process environment
    fixed: Option<HashMap<String, String>>,
}

impl EnvVarConnector {
    /// Primary type tag.
    pub const TYPE: &'static str = "env";

    /// Creates a connector over the whole process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector that prefixes every requested name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            fixed: None,
        }
    }

    /// Creates a connector over fixed values instead of the process environment.
    ///
    /// **Note**: intended for tests and embedding.
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            prefix: None,
            fixed: Some(values),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        let key = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name.to_string(),
        };
        if key.len() > MAX_ENV_KEY_LEN {
            tracing::debug!(key_len = key.len(), "skipping oversized environment key");
            return None;
        }

        let value = match &self.fixed {
            Some(values) => values.get(&key).cloned(),
            None => env::var(&key).ok(),
        }?;

        if value.len() > MAX_ENV_VALUE_LEN {
            tracing::debug!(
                key = %key,
                value_len = value.len(),
                "skipping oversized environment value"
            );
            return None;
        }
        Some(value)
    }
}

impl ValueReferenceConnector for EnvVarConnector {
    fn type_tag(&self) -> &str {
        Self::TYPE
    }

    fn aliases(&self) -> &[&str] {
        &["environment", "envvar"]
    }

    fn resolve_batch(&self, names: &[String]) -> Result<HashMap<String, ConfigValue>> {
        let resolved: HashMap<String, ConfigValue> = names
            .iter()
            .filter_map(|name| self.lookup(name).map(|v| (name.clone(), ConfigValue::from(v))))
            .collect();
        tracing::debug!(
            requested = names.len(),
            resolved = resolved.len(),
            prefix = ?self.prefix,
            "resolved environment references"
        );
        Ok(resolved)
    }

    fn list(&self) -> Result<Option<Vec<String>>> {
        let keys: Vec<String> = match &self.fixed {
            Some(values) => values.keys().cloned().collect(),
            None => env::vars_os()
                .filter_map(|(k, _)| k.into_string().ok())
                .collect(),
        };

        let mut names: Vec<String> = keys
            .into_iter()
            .filter_map(|key| match &self.prefix {
                Some(prefix) => key.strip_prefix(prefix.as_str()).map(str::to_string),
                None => Some(key),
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        Ok(Some(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to set and clean up environment variables
    struct EnvGuard {
        keys: Vec<String>,
    }

    impl EnvGuard {
        fn new() -> Self {
            EnvGuard { keys: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.keys.push(key.to_string());
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_resolve_from_process_environment() {
        let mut guard = EnvGuard::new();
        guard.set("LAYERCFG_TEST_ENV_RESOLVE", "value");

        let connector = EnvVarConnector::new();
        let names = vec![
            "LAYERCFG_TEST_ENV_RESOLVE".to_string(),
            "LAYERCFG_TEST_ENV_ABSENT".to_string(),
        ];
        let resolved = connector.resolve_batch(&names).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["LAYERCFG_TEST_ENV_RESOLVE"].as_str(), "value");
    }

    #[test]
    fn test_prefix_is_prepended_and_stripped() {
        let mut guard = EnvGuard::new();
        guard.set("LAYERCFG_PFX_DB_PASSWORD", "hunter2");

        let connector = EnvVarConnector::with_prefix("LAYERCFG_PFX_");
        let resolved = connector
            .resolve_batch(&["DB_PASSWORD".to_string()])
            .unwrap();
        assert_eq!(resolved["DB_PASSWORD"].as_str(), "hunter2");

        let listed = connector.list().unwrap().unwrap();
        assert!(listed.contains(&"DB_PASSWORD".to_string()));
    }

    #[test]
    fn test_fixed_values() {
        let mut values = HashMap::new();
        values.insert("B".to_string(), "2".to_string());
        values.insert("A".to_string(), "1".to_string());
        let connector = EnvVarConnector::with_values(values);

        assert_eq!(
            connector.list().unwrap(),
            Some(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_oversized_value_is_skipped() {
        let mut values = HashMap::new();
        values.insert("BIG".to_string(), "x".repeat(MAX_ENV_VALUE_LEN + 1));
        let connector = EnvVarConnector::with_values(values);
        assert!(connector
            .resolve_batch(&["BIG".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_type_tags() {
        let connector = EnvVarConnector::new();
        assert!(connector.supports_type("env"));
        assert!(connector.supports_type("envvar"));
        assert!(!connector.supports_type("ssm"));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scalar leaf values with type-safe conversions.
//!
//! Document leaves, resolved references and connector payloads all surface as
//! [`ConfigValue`], a string-backed scalar with typed accessors.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

/// A string-backed scalar configuration value.
///
/// # Examples
///
/// ```
/// use layercfg::domain::ConfigValue;
///
/// let value = ConfigValue::from("42");
/// assert_eq!(value.as_i64("server.port").unwrap(), 42);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigValue(String);

impl ConfigValue {
    /// Creates a new `ConfigValue` from a `String`.
    pub fn new(value: String) -> Self {
        ConfigValue(value)
    }

    /// Converts a scalar YAML node; mappings and sequences yield `None`.
    ///
    /// `null` becomes the empty string.
    pub fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ConfigValue(s.clone())),
            Value::Number(n) => Some(ConfigValue(n.to_string())),
            Value::Bool(b) => Some(ConfigValue(b.to_string())),
            Value::Null => Some(ConfigValue(String::new())),
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
            Value::Mapping(_) | Value::Sequence(_) => None,
        }
    }

    /// Returns the value as a YAML string node.
    pub fn to_yaml(&self) -> Value {
        Value::String(self.0.clone())
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the value to a boolean.
    ///
    /// Recognizes (case-insensitive) `true`/`yes`/`1`/`on` and `false`/`no`/`0`/`off`.
    pub fn as_bool(&self, key: &str) -> Result<bool> {
        match self.0.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => self.parse::<bool>(key),
        }
    }

    /// Converts the value to an `i64`.
    pub fn as_i64(&self, key: &str) -> Result<i64> {
        self.parse(key)
    }

    /// Converts the value to a `u64`.
    pub fn as_u64(&self, key: &str) -> Result<u64> {
        self.parse(key)
    }

    /// Converts the value to an `f64`.
    pub fn as_f64(&self, key: &str) -> Result<f64> {
        self.parse(key)
    }

    /// Parses the value into any type that implements `FromStr`.
    ///
    /// ```
    /// use layercfg::domain::ConfigValue;
    /// use std::net::IpAddr;
    ///
    /// let ip: IpAddr = ConfigValue::from("127.0.0.1").parse("bind").unwrap();
    /// assert!(ip.is_loopback());
    /// ```
    pub fn parse<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.0
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::TypeConversion {
                key: key.to_string(),
                target_type: std::any::type_name::<T>().to_string(),
                source: Box::new(e),
            })
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue(s.to_string())
    }
}

impl From<ConfigValue> for String {
    fn from(value: ConfigValue) -> Self {
        value.0
    }
}

impl AsRef<str> for ConfigValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML document parser.

use crate::domain::{ConfigError, Document, Result};
use crate::ports::DocumentParser;
use serde_yaml::Value;

/// YAML parser implementation.
///
/// The top level of a YAML document must be a mapping; blank content and an explicit
/// `null` yield an empty document.
///
/// # Examples
///
/// ```rust
/// use layercfg::adapters::YamlParser;
/// use layercfg::domain::ConfigKey;
/// use layercfg::ports::DocumentParser;
///
/// let parser = YamlParser::new();
/// let doc = parser.parse("database:\n  host: localhost\n  port: 5432").unwrap();
/// let host = doc.get_value(&ConfigKey::parse("database.host").unwrap()).unwrap();
/// assert_eq!(host.as_str(), "localhost");
/// ```
#[derive(Debug, Clone, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Creates a new YAML parser.
    pub fn new() -> Self {
        YamlParser
    }
}

impl DocumentParser for YamlParser {
    fn parse(&self, content: &str) -> Result<Document> {
        if content.trim().is_empty() {
            return Ok(Document::empty());
        }

        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to parse YAML: {}", e),
            source: Some(Box::new(e)),
        })?;

        match value {
            Value::Mapping(map) => Ok(Document::from_mapping(map)),
            Value::Null => Ok(Document::empty()),
            other => Err(ConfigError::ParseError {
                message: format!(
                    "YAML document root must be a mapping, found {}",
                    kind(&other)
                ),
                source: None,
            }),
        }
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigKey;

    #[test]
    fn test_parse_nested() {
        let doc = YamlParser::new()
            .parse("app:\n  name: shop\n  replicas: 3\n")
            .unwrap();
        assert_eq!(
            doc.get_value(&ConfigKey::parse("app.replicas").unwrap())
                .unwrap()
                .as_str(),
            "3"
        );
    }

    #[test]
    fn test_parse_blank_and_null() {
        assert!(YamlParser::new().parse("").unwrap().is_empty());
        assert!(YamlParser::new().parse("  \n").unwrap().is_empty());
        assert!(YamlParser::new().parse("~").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = YamlParser::new().parse("a: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_parse_non_mapping_root() {
        let err = YamlParser::new().parse("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("a sequence"));
    }

    #[test]
    fn test_supports_extensions() {
        let parser = YamlParser::new();
        assert!(parser.supports("cfg/conf.d/01-a.yaml"));
        assert!(parser.supports("cfg/app.YML"));
        assert!(!parser.supports("cfg/README.md"));
        assert!(!parser.supports("cfg/.yaml"));
        assert!(!parser.supports("cfg/noext"));
    }
}

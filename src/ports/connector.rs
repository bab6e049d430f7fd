// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value reference connector trait definition.
//!
//! A [`ValueReferenceConnector`] resolves names referenced from configuration
//! documents (secrets, parameters, environment variables) into concrete values.

use crate::domain::{ConfigValue, Result};
use std::collections::HashMap;

/// A trait for external value stores.
///
/// Connectors declare a primary type tag plus aliases; a reference `${tag://name}`
/// is routed to the connector whose tag or alias equals `tag`.
///
/// # Examples
///
/// ```rust
/// use layercfg::domain::{ConfigValue, Result};
/// use layercfg::ports::ValueReferenceConnector;
/// use std::collections::HashMap;
///
/// struct Upper;
///
/// impl ValueReferenceConnector for Upper {
///     fn type_tag(&self) -> &str {
///         "upper"
///     }
///
///     fn resolve_batch(&self, names: &[String]) -> Result<HashMap<String, ConfigValue>> {
///         Ok(names
///             .iter()
///             .map(|n| (n.clone(), ConfigValue::from(n.to_uppercase())))
///             .collect())
///     }
/// }
///
/// assert!(Upper.supports_type("upper"));
/// assert!(!Upper.supports_type("lower"));
/// ```
pub trait ValueReferenceConnector: Send + Sync {
    /// Primary type tag.
    fn type_tag(&self) -> &str;

    /// Alternative tags accepted by this connector.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Resolves one batch of names. Names unknown to the store are simply absent
    /// from the returned map.
    fn resolve_batch(&self, names: &[String]) -> Result<HashMap<String, ConfigValue>>;

    /// Lists all known names, if the store supports discovery.
    fn list(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Releases any resources held by the connector. Idempotent.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Returns true if `type_tag` is the primary tag or an alias.
    fn supports_type(&self, type_tag: &str) -> bool {
        self.type_tag() == type_tag || self.aliases().contains(&type_tag)
    }
}

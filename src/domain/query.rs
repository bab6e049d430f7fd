// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fetch query and logical path interpolation.

use crate::domain::errors::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*([A-Za-z0-9_.\-]+)\s*\}").expect("valid placeholder regex"));

/// Immutable attribute bundle that scopes a fetch.
///
/// # Examples
///
/// ```
/// use layercfg::domain::Query;
///
/// let query = Query::new("billing")
///     .with_envs(["prod", "eu"])
///     .with_datacenter("dc1");
///
/// let paths = query.interpolate("cfg/${application}/${env}").unwrap();
/// assert_eq!(paths, vec!["cfg/billing/prod", "cfg/billing/eu"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Query {
    application: String,
    datacenter: Option<String>,
    zone: Option<String>,
    envs: Vec<String>,
    labels: BTreeMap<String, String>,
}

impl Query {
    /// Creates a query for the given application name.
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            ..Default::default()
        }
    }

    /// Sets the datacenter/region.
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Sets the availability zone.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Sets the environments, in precedence order.
    pub fn with_envs<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envs = envs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an arbitrary label usable as `${name}` in logical paths.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Application name.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Datacenter, if set.
    pub fn datacenter(&self) -> Option<&str> {
        self.datacenter.as_deref()
    }

    /// Zone, if set.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// Environments in precedence order.
    pub fn envs(&self) -> &[String] {
        &self.envs
    }

    /// Labels.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "application" | "app" => Some(self.application.as_str()).filter(|s| !s.is_empty()),
            "datacenter" | "dc" => self.datacenter(),
            "zone" => self.zone(),
            other => self.labels.get(other).map(String::as_str),
        }
    }

    /// Interpolates `${attribute}` placeholders in one logical path.
    ///
    /// A path referencing `${env}` expands into one concrete path per environment.
    /// Unknown attributes and unterminated placeholders are rejected.
    pub fn interpolate(&self, path: &str) -> Result<Vec<String>> {
        let uses_env = PLACEHOLDER
            .captures_iter(path)
            .any(|c| &c[1] == "env");

        let envs: Vec<Option<&str>> = if uses_env {
            if self.envs.is_empty() {
                return Err(ConfigError::invalid_reference(
                    path,
                    "path references ${env} but the query has no environments",
                ));
            }
            self.envs.iter().map(|e| Some(e.as_str())).collect()
        } else {
            vec![None]
        };

        envs.into_iter()
            .map(|env| self.interpolate_one(path, env))
            .collect()
    }

    fn interpolate_one(&self, path: &str, env: Option<&str>) -> Result<String> {
        let mut out = String::with_capacity(path.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(path) {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let name = &caps[1];
            let value = match (name, env) {
                ("env", Some(env)) => env,
                _ => self.attribute(name).ok_or_else(|| {
                    ConfigError::invalid_reference(
                        path,
                        format!("no value for placeholder ${{{}}}", name),
                    )
                })?,
            };
            out.push_str(literal(path, &path[last..whole.start])?);
            out.push_str(value);
            last = whole.end;
        }
        out.push_str(literal(path, &path[last..])?);
        Ok(out)
    }

    /// Interpolates and sanitizes a list of logical paths, preserving order and
    /// dropping duplicates.
    pub fn interpolate_all<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<String>> {
        let mut result: Vec<String> = Vec::new();
        for path in paths {
            for concrete in self.interpolate(path.as_ref())? {
                let Some(clean) = sanitize_path(&concrete) else {
                    continue;
                };
                if !result.contains(&clean) {
                    result.push(clean);
                }
            }
        }
        Ok(result)
    }
}

// Text between placeholders must not open another one.
fn literal<'a>(path: &str, segment: &'a str) -> Result<&'a str> {
    if segment.contains("${") {
        return Err(ConfigError::invalid_reference(
            path,
            "malformed or unterminated placeholder",
        ));
    }
    Ok(segment)
}

/// Trims a concrete path, collapses `//` and drops trailing slashes.
/// Returns `None` when nothing is left.
pub fn sanitize_path(path: &str) -> Option<String> {
    let trimmed = path.trim();
    let mut clean = String::with_capacity(trimmed.len());
    let mut prev_slash = false;
    for ch in trimmed.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        clean.push(ch);
    }
    while clean.len() > 1 && clean.ends_with('/') {
        clean.pop();
    }
    if clean.is_empty() || clean == "/" {
        None
    } else {
        Some(clean)
    }
}

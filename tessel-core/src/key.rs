use crate::{Result, TesselError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace used when a caller does not name one.
pub const DEFAULT_NAMESPACE: &str = "global";

/// Composite key addressing one config entry: `(namespace, path)`.
///
/// Construction validates the key, so a `ConfigKey` value is always storable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    namespace: String,
    path: String,
}

impl ConfigKey {
    /// Build a key, substituting [`DEFAULT_NAMESPACE`] for a blank namespace.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        let namespace = normalize_namespace(&namespace.into())?;
        let path = path.into();
        if path.is_empty() {
            return Err(TesselError::InvalidRequest(
                "config path cannot be empty".to_string(),
            ));
        }

        Ok(Self { namespace, path })
    }

    pub fn in_default_namespace(path: impl Into<String>) -> Result<Self> {
        Self::new(DEFAULT_NAMESPACE, path)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key under which the entry lives in the backing store.
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}{}", namespace_prefix(prefix, &self.namespace), self.path)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.path)
    }
}

/// Trims the namespace and falls back to the default when blank.
///
/// Namespaces may not contain `/`; that keeps `{prefix}/{namespace}/{path}`
/// unambiguous for any path.
pub fn normalize_namespace(namespace: &str) -> Result<String> {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_NAMESPACE.to_string());
    }

    if trimmed.contains('/') {
        return Err(TesselError::InvalidRequest(format!(
            "namespace cannot contain '/': {}",
            trimmed
        )));
    }

    Ok(trimmed.to_string())
}

/// Storage prefix shared by every key of one namespace, trailing slash included.
pub fn namespace_prefix(prefix: &str, namespace: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{}/", namespace)
    } else {
        format!("{}/{}/", prefix, namespace)
    }
}

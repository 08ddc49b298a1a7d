//! Catalog configuration.
//!
//! Maintenance runs may target tables in different catalogs within the same
//! process, so catalog settings are carried in an explicit configuration
//! struct handed to whoever constructs the [`Catalog`](crate::catalog::Catalog)
//! implementation, never read from ambient global state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prefix under which catalog settings live in a flat session-properties map,
/// completed with the catalog name: `catalog.<name>.<key>`.
pub const CATALOG_PROPERTY_PREFIX: &str = "catalog";

/// Configuration for one named catalog connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    name: String,
    properties: HashMap<String, String>,
}

impl CatalogConfig {
    /// Create an empty configuration for the named catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Add a single configuration property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Extract the configuration for the named catalog from a flat
    /// session-properties map.
    ///
    /// Keys of the form `catalog.<name>.<key>` are collected with the prefix
    /// stripped; everything else is ignored.
    pub fn from_session_properties(
        name: impl Into<String>,
        session: &HashMap<String, String>,
    ) -> Self {
        let name = name.into();
        let prefix = format!("{CATALOG_PROPERTY_PREFIX}.{name}.");
        let properties = session
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|stripped| (stripped.to_string(), value.clone()))
            })
            .collect();
        Self { name, properties }
    }

    /// The catalog name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All configured properties.
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Look up a single property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

//! World configuration.

use serde::Deserialize;

use crate::error::SchemaError;

/// Tunables for a `World`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Target size in bytes of one component pool page.
    pub page_bytes: usize,
    /// A fixed number of entities per page, overriding `page_bytes`.
    pub page_size: Option<usize>,
}

impl WorldConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<WorldConfig, SchemaError> {
        Ok(toml::from_str(source)?)
    }

    /// The number of entities per page for a component of `element_size`
    /// bytes.
    pub fn page_size_for(&self, element_size: usize) -> usize {
        if let Some(page_size) = self.page_size {
            return page_size.max(1);
        }

        if element_size == 0 {
            self.page_bytes.max(1)
        } else {
            (self.page_bytes / element_size).max(1)
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            page_bytes: 1024,
            page_size: None,
        }
    }
}

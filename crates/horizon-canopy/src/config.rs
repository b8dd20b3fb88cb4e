//! Model configuration.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes:
//!
//! ```
//! use horizon_canopy::ModelConfig;
//!
//! let config = ModelConfig::from_toml_str(r#"
//!     label_attr = "title"
//!     root_label = "Library"
//!
//!     [query]
//!     kind = "shelf"
//! "#).unwrap();
//! assert_eq!(config.label_attr, "title");
//! assert_eq!(config.parent_property, "parent");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::store::{LoadOptions, Query, QueryOptions};

/// Settings for a store-backed tree model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Field used as an item's label.
    pub label_attr: String,
    /// Field used as an item's icon, if any.
    pub icon_attr: Option<String>,
    /// Field naming an item's parents. A store may override it.
    pub parent_property: String,
    /// Label reported for the root instead of its own field.
    pub root_label: Option<String>,
    /// Identity of the synthetic forest root.
    pub root_id: String,
    /// Root query. In forest mode it selects the root's children.
    pub query: Query,
    /// Sorting and paging for children and root queries.
    pub query_options: QueryOptions,
    /// Options for the one-shot store load.
    pub load_options: LoadOptions,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            label_attr: "name".to_string(),
            icon_attr: None,
            parent_property: "parent".to_string(),
            root_label: None,
            root_id: "$root$".to_string(),
            query: Query::new(),
            query_options: QueryOptions::default(),
            load_options: LoadOptions::default(),
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> ModelResult<Self> {
        toml::from_str(s).map_err(|e| ModelError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Serializes to a TOML document.
    pub fn to_toml_string(&self) -> ModelResult<String> {
        toml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))
    }

    pub fn with_label_attr(mut self, label_attr: impl Into<String>) -> Self {
        self.label_attr = label_attr.into();
        self
    }

    pub fn with_icon_attr(mut self, icon_attr: impl Into<String>) -> Self {
        self.icon_attr = Some(icon_attr.into());
        self
    }

    pub fn with_parent_property(mut self, parent_property: impl Into<String>) -> Self {
        self.parent_property = parent_property.into();
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Adds one constraint to the root query.
    pub fn with_query_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query = self.query.with(field, value);
        self
    }

    pub fn with_query_options(mut self, query_options: QueryOptions) -> Self {
        self.query_options = query_options;
        self
    }

    pub fn with_load_options(mut self, load_options: LoadOptions) -> Self {
        self.load_options = load_options;
        self
    }

    pub fn with_root_label(mut self, root_label: impl Into<String>) -> Self {
        self.root_label = Some(root_label.into());
        self
    }

    pub fn with_root_id(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::from_toml_str("").unwrap();
        assert_eq!(config, ModelConfig::default());
        assert_eq!(config.root_id, "$root$");
        assert!(config.query.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let config = ModelConfig::from_toml_str(
            r#"
            label_attr = "title"
            icon_attr = "icon"
            parent_property = "folder"
            root_id = "top"

            [query]
            type = "continent"

            [query_options]
            start = 1
            count = 10
            sort = [{ attribute = "title", descending = true }]
            "#,
        )
        .unwrap();
        assert_eq!(config.icon_attr.as_deref(), Some("icon"));
        assert_eq!(config.query.get("type"), Some(&json!("continent")));
        assert_eq!(config.query_options.count, Some(10));
        assert!(config.query_options.sort[0].descending);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ModelConfig::from_toml_str("label_attr = [").unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ModelConfig::new().with_root_label("Everything").with_query_field("kind", "dir");
        let text = config.to_toml_string().unwrap();
        assert_eq!(ModelConfig::from_toml_str(&text).unwrap(), config);
    }
}

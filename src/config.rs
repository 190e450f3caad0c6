use crate::epub::writer::DEFAULT_STYLESHEET;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_language() -> String {
    "en".to_string()
}

/// Per-conversion settings, loadable from a YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Catalog key used for the metadata lookup.
    pub book_id: Option<String>,
    /// Language written when neither the catalog nor the source has one.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// CSS file replacing the built-in stylesheet.
    pub stylesheet: Option<PathBuf>,
    /// Package identifier override.
    pub identifier: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            book_id: None,
            default_language: default_language(),
            stylesheet: None,
            identifier: None,
        }
    }
}

impl ConvertOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: ConvertOptions = serde_yaml_ng::from_str(&content)?;
        Ok(options)
    }

    /// Stylesheet text to embed in the package.
    pub fn stylesheet_css(&self) -> Result<String> {
        match &self.stylesheet {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Ok(DEFAULT_STYLESHEET.to_string()),
        }
    }
}

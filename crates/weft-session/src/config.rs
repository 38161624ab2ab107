use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading an engine configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Engine configuration options.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// HTML-escape every printed expression unless it opts out with the
    /// `raw` filter.
    pub auto_escape: bool,
    /// Maximum number of cached compiled templates.
    pub cache_limit: usize,
    /// Skip modification-time staleness checks and always reuse cached
    /// artifacts.
    pub trust_cache: bool,
    /// Glob matched against resource names when warming the cache.
    pub template_glob: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_escape: false,
            cache_limit: 64,
            trust_cache: false,
            template_glob: "**/*.tpl".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a configuration file from disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&path, &text)
    }

    /// A stable signature of the options that affect compiled output,
    /// folded into cache fingerprints.
    pub(crate) fn compile_signature(&self) -> String {
        format!("auto_escape={}", self.auto_escape)
    }
}

//! Resource loading for the weft template engine.
//!
//! A [`ResourceLoader`] maps a template name to its source text and an
//! optional modification time. The engine treats loaders as opaque: any
//! storage works as long as lookups are stable for the lifetime of a
//! render. Two loaders are provided: [`InMemoryLoader`] for tests and
//! embedded templates, and [`DirLoader`] for a template directory on disk.

mod loader;

pub use loader::{DirLoader, InMemoryLoader};

use std::time::SystemTime;

use thiserror::Error;

/// Errors produced by resource loaders.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid resource name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Maps template names to source text.
pub trait ResourceLoader: Send {
    /// Fetch the source text for a resource name.
    fn get_resource(&self, name: &str) -> Result<String, SourceError>;

    /// Last modification time of the resource, when the storage knows it.
    fn modification_time(&self, name: &str) -> Option<SystemTime>;

    /// Enumerate the resource names matching a glob pattern, when the
    /// storage supports enumeration. Used for cache warming.
    fn names(&self, _pattern: &str) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }
}

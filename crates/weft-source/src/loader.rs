use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use walkdir::WalkDir;

use crate::{ResourceLoader, SourceError};

/// A loader backed by an in-memory name → source map.
#[derive(Default)]
pub struct InMemoryLoader {
    sources: HashMap<String, (String, SystemTime)>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template, stamping it with the current time.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources
            .insert(name.into(), (source.into(), SystemTime::now()));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl ResourceLoader for InMemoryLoader {
    fn get_resource(&self, name: &str) -> Result<String, SourceError> {
        self.sources
            .get(name)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| SourceError::NotFound(name.to_string()))
    }

    fn modification_time(&self, name: &str) -> Option<SystemTime> {
        self.sources.get(name).map(|(_, mtime)| *mtime)
    }

    fn names(&self, pattern: &str) -> Result<Vec<String>, SourceError> {
        let pattern = Pattern::new(pattern).map_err(|source| SourceError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let mut names: Vec<String> = self
            .sources
            .keys()
            .filter(|name| pattern.matches(name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

/// A loader reading templates from a directory tree.
///
/// Resource names are relative paths below the root; names escaping the
/// root (`..`, absolute paths) are rejected before touching the disk.
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, SourceError> {
        let rel = Path::new(name);
        if rel.is_absolute() {
            return Err(SourceError::InvalidName {
                name: name.to_string(),
                reason: "absolute paths are not allowed",
            });
        }
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(SourceError::InvalidName {
                name: name.to_string(),
                reason: "`..` is not allowed",
            });
        }
        Ok(self.root.join(rel))
    }
}

impl ResourceLoader for DirLoader {
    fn get_resource(&self, name: &str) -> Result<String, SourceError> {
        let path = self.resolve(name)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(name.to_string()))
            }
            Err(source) => Err(SourceError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn modification_time(&self, name: &str) -> Option<SystemTime> {
        let path = self.resolve(name).ok()?;
        std::fs::metadata(path).ok()?.modified().ok()
    }

    fn names(&self, pattern: &str) -> Result<Vec<String>, SourceError> {
        let pattern = Pattern::new(pattern).map_err(|source| SourceError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = rel.to_string_lossy().replace('\\', "/");
            if pattern.matches(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

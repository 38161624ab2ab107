use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use weft_core::ir::Template;

/// The cache key for one compiled artifact: a stable hash of the
/// resource name, the compile options and the literal text of a dynamic
/// extends clause, if the template has one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn compute(resource: &str, options: &str, extends_key: Option<&str>) -> Self {
        let mut hasher = DefaultHasher::new();
        resource.hash(&mut hasher);
        options.hash(&mut hasher);
        extends_key.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One cached artifact with its creation time for staleness checks.
#[derive(Clone)]
pub struct CacheEntry {
    pub template: Arc<Template>,
    pub created: SystemTime,
}

/// Cache for compiled templates.
///
/// Read-mostly, last-writer-wins; entries are immutable once stored, so
/// a race between a staleness check and a concurrent recompile costs at
/// worst a redundant recompile.
pub struct TemplateCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    /// Order of insertion for LRU eviction.
    order: Vec<Fingerprint>,
    max_entries: usize,
}

impl TemplateCache {
    /// Create a cache with the given maximum number of entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            max_entries,
        }
    }

    pub fn get(&mut self, fingerprint: Fingerprint) -> Option<CacheEntry> {
        let entry = self.entries.get(&fingerprint).cloned()?;
        self.touch(fingerprint);
        Some(entry)
    }

    /// Insert an artifact, evicting the oldest entry when over capacity.
    pub fn insert(&mut self, fingerprint: Fingerprint, template: Arc<Template>) {
        if self.max_entries == 0 {
            return;
        }
        let entry = CacheEntry {
            template,
            created: SystemTime::now(),
        };
        if self.entries.insert(fingerprint, entry).is_some() {
            self.touch(fingerprint);
            return;
        }
        while self.entries.len() > self.max_entries && !self.order.is_empty() {
            let oldest = self.order.remove(0);
            self.entries.remove(&oldest);
        }
        self.order.push(fingerprint);
    }

    pub fn invalidate(&mut self, fingerprint: Fingerprint) {
        self.entries.remove(&fingerprint);
        self.order.retain(|&f| f != fingerprint);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, fingerprint: Fingerprint) {
        self.order.retain(|&f| f != fingerprint);
        self.order.push(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str) -> Arc<Template> {
        Arc::new(Template {
            resource: name.to_string(),
            body: Vec::new(),
            dependencies: vec![name.to_string()],
            extends_key: None,
        })
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        let a = Fingerprint::compute("page.tpl", "", None);
        let b = Fingerprint::compute("page.tpl", "", None);
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::compute("other.tpl", "", None));
        assert_ne!(a, Fingerprint::compute("page.tpl", "escape", None));
        assert_ne!(a, Fingerprint::compute("page.tpl", "", Some("$base")));
    }

    #[test]
    fn cache_roundtrip() {
        let mut cache = TemplateCache::new(4);
        let fp = Fingerprint::compute("a", "", None);
        assert!(cache.get(fp).is_none());
        cache.insert(fp, template("a"));
        assert_eq!(cache.get(fp).unwrap().template.resource, "a");
    }

    #[test]
    fn eviction_drops_the_oldest() {
        let mut cache = TemplateCache::new(2);
        let fps: Vec<Fingerprint> = ["a", "b", "c"]
            .iter()
            .map(|n| Fingerprint::compute(n, "", None))
            .collect();
        for (fp, name) in fps.iter().zip(["a", "b", "c"]) {
            cache.insert(*fp, template(name));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(fps[0]).is_none());
        assert!(cache.get(fps[2]).is_some());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = TemplateCache::new(0);
        let fp = Fingerprint::compute("a", "", None);
        cache.insert(fp, template("a"));
        assert!(cache.is_empty());
    }
}

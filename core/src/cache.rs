//! A single content-addressed cache, consolidating what would otherwise be
//! several ad-hoc mutable process-wide caches (instrumented source,
//! sourcemap, code map, comment scan) into one home with explicit
//! `invalidate`/`clear` verbs instead of several bespoke ones.

use std::collections::HashMap;

use crate::path::FileKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    file: u64,
    content_hash: u64,
}

/// Caches values of type `V` keyed by `(FileKey, content_hash)`. A cache hit
/// requires both the file identity and the exact byte content to match;
/// any edit to the source invalidates its entry automatically just by
/// producing a different `content_hash`, without needing an explicit
/// `invalidate` call on every write.
#[derive(Debug, Default)]
pub struct ContentCache<V> {
    entries: HashMap<CacheKey, V>,
    keys_by_file: HashMap<FileKey, CacheKey>,
}

impl<V> ContentCache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            keys_by_file: HashMap::new(),
        }
    }

    pub fn get(&self, file: &FileKey, content_hash: u64) -> Option<&V> {
        let key = CacheKey {
            file: seahash::hash(file.as_str().as_bytes()),
            content_hash,
        };
        self.entries.get(&key)
    }

    pub fn insert(&mut self, file: &FileKey, content_hash: u64, value: V) {
        let key = CacheKey {
            file: seahash::hash(file.as_str().as_bytes()),
            content_hash,
        };
        self.entries.insert(key, value);
        self.keys_by_file.insert(file.clone(), key);
    }

    /// Drops whatever entry is currently cached for `file`, regardless of
    /// its content hash.
    pub fn invalidate(&mut self, file: &FileKey) {
        if let Some(key) = self.keys_by_file.remove(file) {
            self.entries.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys_by_file.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

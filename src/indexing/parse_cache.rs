//! Bounded cache of parsed syntax trees.
//!
//! Pass 1 parks trees here so Pass 2 can pick them up without reparsing;
//! across watcher batches it also spares unchanged neighbors. Entries are
//! keyed by file key and validated against the content hash, with
//! least-recently-used eviction at capacity.

use std::collections::{HashMap, VecDeque};
use tree_sitter::Tree;

pub struct CachedTree {
    pub content_hash: String,
    pub tree: Tree,
}

pub struct ParseCache {
    capacity: usize,
    map: HashMap<String, CachedTree>,
    order: VecDeque<String>,
}

impl ParseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Tree for `key` iff the cached entry matches `content_hash`.
    pub fn get(&mut self, key: &str, content_hash: &str) -> Option<&CachedTree> {
        let hit = self
            .map
            .get(key)
            .is_some_and(|c| c.content_hash == content_hash);
        if !hit {
            return None;
        }
        self.touch(key);
        self.map.get(key)
    }

    pub fn insert(&mut self, key: String, content_hash: String, tree: Tree) {
        if self.map.contains_key(&key) {
            self.touch(&key);
        } else {
            while self.map.len() >= self.capacity {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.map.remove(&oldest);
            }
            self.order.push_back(key.clone());
        }
        self.map.insert(key, CachedTree { content_hash, tree });
    }

    pub fn remove(&mut self, key: &str) {
        self.map.remove(key);
        self.order.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::typescript;

    fn tree() -> Tree {
        typescript::parse("const x = 1;").unwrap()
    }

    #[test]
    fn hash_mismatch_is_a_miss() {
        let mut cache = ParseCache::new(4);
        cache.insert("k".to_string(), "h1".to_string(), tree());
        assert!(cache.get("k", "h1").is_some());
        assert!(cache.get("k", "h2").is_none());
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut cache = ParseCache::new(2);
        cache.insert("a".to_string(), "h".to_string(), tree());
        cache.insert("b".to_string(), "h".to_string(), tree());
        // refresh "a" so "b" is the eviction candidate
        assert!(cache.get("a", "h").is_some());
        cache.insert("c".to_string(), "h".to_string(), tree());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "h").is_some());
        assert!(cache.get("b", "h").is_none());
        assert!(cache.get("c", "h").is_some());
    }
}

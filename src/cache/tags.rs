//! Tag Index Module
//!
//! Secondary index from an invalidation tag to the keys carrying it.

use std::collections::{HashMap, HashSet};

// == Tag Index ==
/// Maps each tag to the set of cache keys that carry it.
///
/// Only `CacheStore` mutates the index, so every key it returns has a live
/// entry in the owning store. Empty buckets are dropped eagerly.
#[derive(Debug, Default)]
pub struct TagIndex {
    buckets: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    // == Constructor ==
    /// Creates a new empty tag index.
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    // == Add ==
    /// Records that `key` carries `tag`.
    pub(crate) fn add(&mut self, tag: &str, key: &str) {
        self.buckets
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());
    }

    // == Remove ==
    /// Drops `key` from the bucket for `tag`, removing the bucket if it
    /// becomes empty.
    pub(crate) fn remove(&mut self, tag: &str, key: &str) {
        if let Some(keys) = self.buckets.get_mut(tag) {
            keys.remove(key);
            if keys.is_empty() {
                self.buckets.remove(tag);
            }
        }
    }

    // == Take ==
    /// Removes and returns the whole bucket for `tag`.
    pub(crate) fn take(&mut self, tag: &str) -> HashSet<String> {
        self.buckets.remove(tag).unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
    }

    // == Keys For Tag ==
    /// Returns the keys currently indexed under `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.buckets.get(tag).cloned().unwrap_or_default()
    }

    /// Returns true if `key` is indexed under `tag`.
    pub fn contains(&self, tag: &str, key: &str) -> bool {
        self.buckets.get(tag).is_some_and(|keys| keys.contains(key))
    }

    /// Iterates over every (tag, key) membership.
    pub(crate) fn memberships(&self) -> impl Iterator<Item = (&str, &str)> {
        self.buckets
            .iter()
            .flat_map(|(tag, keys)| keys.iter().map(move |k| (tag.as_str(), k.as_str())))
    }

    /// Number of non-empty tag buckets.
    pub fn tag_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_new() {
        let index = TagIndex::new();
        assert!(index.is_empty());
        assert!(index.keys_for_tag("anything").is_empty());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut index = TagIndex::new();
        index.add("research", "k1");
        index.add("research", "k2");
        index.add("documents", "k2");

        assert_eq!(index.keys_for_tag("research").len(), 2);
        assert!(index.contains("documents", "k2"));
        assert!(!index.contains("documents", "k1"));
        assert_eq!(index.tag_count(), 2);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut index = TagIndex::new();
        index.add("t", "k");
        index.add("t", "k");
        assert_eq!(index.keys_for_tag("t").len(), 1);
    }

    #[test]
    fn test_remove_drops_empty_bucket() {
        let mut index = TagIndex::new();
        index.add("t", "k1");
        index.add("t", "k2");

        index.remove("t", "k1");
        assert_eq!(index.tag_count(), 1);

        index.remove("t", "k2");
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_nonexistent() {
        let mut index = TagIndex::new();
        index.add("t", "k1");

        // Should not panic or affect existing memberships
        index.remove("t", "missing");
        index.remove("missing", "k1");

        assert!(index.contains("t", "k1"));
    }

    #[test]
    fn test_take_empties_bucket() {
        let mut index = TagIndex::new();
        index.add("t", "k1");
        index.add("t", "k2");
        index.add("other", "k1");

        let taken = index.take("t");
        assert_eq!(taken.len(), 2);
        assert!(index.keys_for_tag("t").is_empty());
        assert!(index.contains("other", "k1"));
    }

    #[test]
    fn test_memberships() {
        let mut index = TagIndex::new();
        index.add("a", "k1");
        index.add("b", "k1");
        index.add("b", "k2");

        let mut pairs: Vec<(&str, &str)> = index.memberships().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("a", "k1"), ("b", "k1"), ("b", "k2")]);
    }
}

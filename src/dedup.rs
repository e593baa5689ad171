//! First-seen URL tracking for admission (spec.md §4.6, §5 "URLDedup").
//!
//! A `dashmap`-backed set gives concurrent-map semantics — inserts are
//! visible to every subsequent `contains`/`insert` call across shards —
//! without a single coarse lock, the same tradeoff the teacher's
//! `DeviceRegistry` makes for its id → device map.

use dashmap::DashSet;

pub struct UrlDedup {
    seen: DashSet<String>,
}

impl UrlDedup {
    pub fn new() -> Self {
        UrlDedup {
            seen: DashSet::new(),
        }
    }

    /// Records `url` as seen. Returns `true` if this is the first time it
    /// has been recorded, `false` if it was already present.
    pub fn insert(&self, url: impl Into<String>) -> bool {
        self.seen.insert(url.into())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for UrlDedup {
    fn default() -> Self {
        UrlDedup::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_is_new_second_is_not() {
        let dedup = UrlDedup::new();
        assert!(dedup.insert("http://example.com/"));
        assert!(!dedup.insert("http://example.com/"));
        assert_eq!(dedup.len(), 1);
    }
}

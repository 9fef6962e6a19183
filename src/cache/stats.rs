//! Cache Statistics
//!
//! Lookup and removal counters kept by the controller, merged with a usage
//! snapshot of the slot file when reported.

use std::hash::Hash;

use serde::Serialize;

use crate::cache::file_store::SlotFileStore;

/// Counters plus the slot file usage at the time of the snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups for absent or expired keys
    pub misses: u64,
    /// Entries removed to bring the cache back under its limits
    pub evictions: u64,
    /// Entries removed because their expiry passed
    pub expirations: u64,
    pub total_entries: usize,
    /// Key and value bytes held by live entries
    pub live_bytes: u64,
    /// Bytes a defragmentation would reclaim
    pub lost_space: u64,
    pub file_len: u64,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Expired,
    Evicted,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// hits / (hits + misses), or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_removal(&mut self, removal: Removal) {
        match removal {
            Removal::Expired => self.expirations += 1,
            Removal::Evicted => self.evictions += 1,
        }
    }

    /// Copies the counters and fills the usage fields from `store`.
    pub fn with_usage<K: Hash + Eq + Clone>(&self, store: &SlotFileStore<K>) -> Self {
        Self {
            total_entries: store.len(),
            live_bytes: store.live_bytes(),
            lost_space: store.lost_space(),
            file_len: store.file_len(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{StoreOptions, Utf8Codec, NEVER};
    use tempfile::TempDir;

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);

        for hit in [true, true, true, false] {
            stats.record_lookup(hit);
        }
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_removals_are_counted_separately() {
        let mut stats = CacheStats::new();
        stats.record_removal(Removal::Evicted);
        stats.record_removal(Removal::Evicted);
        stats.record_removal(Removal::Expired);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_usage_snapshot_keeps_counters() {
        let dir = TempDir::new().unwrap();
        let mut store =
            SlotFileStore::open(dir.path().join("stats.dat"), Utf8Codec, StoreOptions::default())
                .unwrap();
        store.put("key".to_string(), b"value", NEVER).unwrap();
        store.put("gone".to_string(), b"x", NEVER).unwrap();
        store.delete(&"gone".to_string()).unwrap();

        let mut counters = CacheStats::new();
        counters.record_lookup(true);
        let stats = counters.with_usage(&store);

        assert_eq!(stats.hits, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.live_bytes, 8);
        assert_eq!(stats.lost_space, 21 + 5);
        assert_eq!(stats.file_len, 2 * 21 + 8 + 5);
    }
}

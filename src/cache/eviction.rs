//! Eviction Ordering Module
//!
//! Defines what the eviction index sorts and which entry counts as the most
//! evictable (the index minimum).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::cache::index::CompareFn;

/// Element stored in the eviction index for every live slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionEntry<K> {
    pub key: K,
    /// Expiry as Unix milliseconds
    pub expire_at: u64,
    /// Value of the store's access clock at the last write or touch
    pub last_access: u64,
}

/// Policy deciding which entry is evicted first when over capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionOrder {
    /// Soonest expiry first, ties broken by least recent access
    #[default]
    Expiry,
    /// Least recently written or read first
    LeastRecentlyUsed,
}

impl EvictionOrder {
    /// Comparator placing the most evictable entry at the index minimum.
    pub fn comparator<K>(self) -> CompareFn<EvictionEntry<K>> {
        match self {
            EvictionOrder::Expiry => by_expiry::<K>,
            EvictionOrder::LeastRecentlyUsed => by_recency::<K>,
        }
    }

    /// True when reads should refresh an entry's position.
    pub fn tracks_reads(self) -> bool {
        matches!(self, EvictionOrder::LeastRecentlyUsed)
    }
}

fn by_expiry<K>(a: &EvictionEntry<K>, b: &EvictionEntry<K>) -> Ordering {
    a.expire_at
        .cmp(&b.expire_at)
        .then(a.last_access.cmp(&b.last_access))
}

fn by_recency<K>(a: &EvictionEntry<K>, b: &EvictionEntry<K>) -> Ordering {
    a.last_access.cmp(&b.last_access)
}

impl FromStr for EvictionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expiry" | "ttl" => Ok(EvictionOrder::Expiry),
            "lru" | "least_recently_used" => Ok(EvictionOrder::LeastRecentlyUsed),
            other => Err(format!("unknown eviction order: {other}")),
        }
    }
}

impl fmt::Display for EvictionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionOrder::Expiry => f.write_str("expiry"),
            EvictionOrder::LeastRecentlyUsed => f.write_str("lru"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expire_at: u64, last_access: u64) -> EvictionEntry<&'static str> {
        EvictionEntry {
            key: "k",
            expire_at,
            last_access,
        }
    }

    #[test]
    fn test_expiry_order_breaks_ties_by_access() {
        let cmp = EvictionOrder::Expiry.comparator();
        assert_eq!(cmp(&entry(10, 5), &entry(20, 1)), Ordering::Less);
        assert_eq!(cmp(&entry(10, 1), &entry(10, 2)), Ordering::Less);
    }

    #[test]
    fn test_recency_order_ignores_expiry() {
        let cmp = EvictionOrder::LeastRecentlyUsed.comparator();
        assert_eq!(cmp(&entry(10, 5), &entry(20, 1)), Ordering::Greater);
    }

    #[test]
    fn test_parse_order() {
        assert_eq!("lru".parse::<EvictionOrder>(), Ok(EvictionOrder::LeastRecentlyUsed));
        assert_eq!("Expiry".parse::<EvictionOrder>(), Ok(EvictionOrder::Expiry));
        assert!("fifo".parse::<EvictionOrder>().is_err());
    }
}

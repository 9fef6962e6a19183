//! Cache Controller Module
//!
//! Coordinates the slot file store with capacity limits and expiry. Every
//! public operation takes the single store lock, runs a cleanup pass that
//! evicts expired and over-capacity entries through the injected evict hook,
//! then performs the store operation under the same lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::codec::Codec;
use crate::cache::eviction::EvictionEntry;
use crate::cache::file_store::{DefragSummary, SlotFileStore, StoreOptions};
use crate::cache::slot::{current_timestamp_ms, expire_at_from_ttl, is_expired};
use crate::cache::stats::{CacheStats, Removal};
use crate::config::Config;
use crate::error::{CacheError, Result, StoreError, StoreResult};

/// Removes one entry from the store. Must delete the entry's slot, which also
/// unlinks its eviction node.
pub type EvictHook<K> =
    Box<dyn Fn(&mut SlotFileStore<K>, &EvictionEntry<K>) -> StoreResult<()> + Send + Sync>;

// == Capacity Limits ==
/// Bounds enforced by the cleanup pass. Zero means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityLimits {
    pub max_entries: usize,
    /// Maximum key + value bytes over live entries
    pub max_bytes: u64,
}

impl CapacityLimits {
    fn exceeded(&self, entries: usize, bytes: u64) -> bool {
        (self.max_entries > 0 && entries > self.max_entries)
            || (self.max_bytes > 0 && bytes > self.max_bytes)
    }
}

struct ControllerState<K> {
    store: Option<SlotFileStore<K>>,
    stats: CacheStats,
}

// == Cache Controller ==
/// Thread-safe, capacity-bounded, expiring cache over a [`SlotFileStore`].
pub struct CacheController<K, V> {
    state: Mutex<ControllerState<K>>,
    value_codec: Box<dyn Codec<V>>,
    limits: CapacityLimits,
    default_ttl: Option<Duration>,
    evict: EvictHook<K>,
}

impl<K, V> CacheController<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructors ==
    /// Wraps an opened store.
    pub fn new(
        store: SlotFileStore<K>,
        value_codec: impl Codec<V> + 'static,
        limits: CapacityLimits,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            state: Mutex::new(ControllerState {
                store: Some(store),
                stats: CacheStats::new(),
            }),
            value_codec: Box::new(value_codec),
            limits,
            default_ttl,
            evict: Box::new(|store: &mut SlotFileStore<K>, entry: &EvictionEntry<K>| {
                store.delete(&entry.key).map(|_| ())
            }),
        }
    }

    /// Opens the backing file named by `config` and applies its limits.
    pub fn open(
        config: &Config,
        key_codec: impl Codec<K> + 'static,
        value_codec: impl Codec<V> + 'static,
    ) -> Result<Self> {
        let store = SlotFileStore::open(config.file_path(), key_codec, StoreOptions::from(config))
            .map_err(CacheError::Loader)?;
        let limits = CapacityLimits {
            max_entries: config.max_entries,
            max_bytes: config.max_bytes,
        };
        Ok(Self::new(store, value_codec, limits, config.default_ttl()))
    }

    /// Replaces the evict hook.
    pub fn with_evict_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut SlotFileStore<K>, &EvictionEntry<K>) -> StoreResult<()> + Send + Sync + 'static,
    {
        self.evict = Box::new(hook);
        self
    }

    // == Load ==
    /// Reads the value under `key`. Absent or expired keys yield None.
    pub fn load(&self, key: &K) -> Result<Option<V>> {
        self.with_state(CacheError::Loader, |this, store, stats| {
            this.load_locked(store, stats, key)
        })
    }

    /// Reads several keys under one lock; absent keys are left out.
    pub fn load_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<HashMap<K, V>>
    where
        K: 'a,
    {
        self.with_state(CacheError::Loader, |this, store, stats| {
            let mut found = HashMap::new();
            for key in keys {
                if let Some(value) = this.load_locked(store, stats, key)? {
                    found.insert(key.clone(), value);
                }
            }
            Ok(found)
        })
    }

    // == Write ==
    /// Writes `value` under `key` using the default TTL.
    pub fn write(&self, key: K, value: &V) -> Result<()> {
        self.write_with_ttl(key, value, self.default_ttl)
    }

    /// Writes with an explicit TTL, None meaning the entry never expires.
    pub fn write_with_ttl(&self, key: K, value: &V, ttl: Option<Duration>) -> Result<()> {
        let expire_at = expire_at_from_ttl(current_timestamp_ms(), ttl);
        self.write_until(key, value, expire_at)
    }

    /// Writes with an absolute expiry in Unix milliseconds.
    pub fn write_until(&self, key: K, value: &V, expire_at: u64) -> Result<()> {
        let bytes = self.value_codec.encode(value).map_err(CacheError::Writer)?;
        self.with_state(CacheError::Writer, |this, store, stats| {
            store.put(key, &bytes, expire_at)?;
            this.clean_up_locked(store, stats)?;
            Ok(())
        })
    }

    /// Writes several entries under one lock using the default TTL.
    pub fn write_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let expire_at = expire_at_from_ttl(current_timestamp_ms(), self.default_ttl);
        let encoded = entries
            .into_iter()
            .map(|(k, v)| self.value_codec.encode(&v).map(|bytes| (k, bytes)))
            .collect::<StoreResult<Vec<_>>>()
            .map_err(CacheError::Writer)?;

        self.with_state(CacheError::Writer, |this, store, stats| {
            for (key, bytes) in encoded {
                store.put(key, &bytes, expire_at)?;
            }
            this.clean_up_locked(store, stats)?;
            Ok(())
        })
    }

    // == Delete ==
    /// Removes `key`. Returns false if it was absent.
    pub fn delete(&self, key: &K) -> Result<bool> {
        self.with_state(CacheError::Writer, |_, store, _| store.delete(key))
    }

    /// Removes several keys under one lock, returning how many existed.
    pub fn delete_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<usize>
    where
        K: 'a,
    {
        self.with_state(CacheError::Writer, |_, store, _| {
            let mut removed = 0;
            for key in keys {
                if store.delete(key)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    // == Maintenance ==
    /// Runs a cleanup pass on its own and returns the number of entries removed.
    pub fn clean_up(&self) -> Result<usize> {
        let mut guard = self.state.lock();
        let ControllerState { store, stats } = &mut *guard;
        let store = store.as_mut().ok_or(CacheError::Closed)?;
        self.clean_up_locked(store, stats).map_err(CacheError::Writer)
    }

    /// Removes every expired entry, not only those at the eviction end.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut guard = self.state.lock();
        let ControllerState { store, stats } = &mut *guard;
        let store = store.as_mut().ok_or(CacheError::Closed)?;

        let expired = store.expired_entries(current_timestamp_ms());
        for entry in &expired {
            self.evict_entry(store, entry).map_err(CacheError::Writer)?;
            stats.record_removal(Removal::Expired);
        }
        Ok(expired.len())
    }

    /// Bytes reclaimable by [`defragment`](Self::defragment).
    pub fn lost_space(&self) -> u64 {
        self.state
            .lock()
            .store
            .as_ref()
            .map_or(0, SlotFileStore::lost_space)
    }

    /// Compacts the backing file.
    pub fn defragment(&self) -> Result<DefragSummary> {
        let mut guard = self.state.lock();
        let store = guard.store.as_mut().ok_or(CacheError::Closed)?;
        store.defragment().map_err(CacheError::Writer)
    }

    /// Counters plus a snapshot of store usage.
    pub fn stats(&self) -> CacheStats {
        let guard = self.state.lock();
        match guard.store.as_ref() {
            Some(store) => guard.stats.with_usage(store),
            None => guard.stats.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().store.as_ref().map_or(0, SlotFileStore::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.state
            .lock()
            .store
            .as_ref()
            .is_some_and(|s| s.contains_key(key))
    }

    pub fn limits(&self) -> CapacityLimits {
        self.limits
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().store.is_none()
    }

    // == Close ==
    /// Closes the backing store. Later operations fail with [`CacheError::Closed`].
    pub fn close(&self) -> Result<()> {
        let store = self.state.lock().store.take().ok_or(CacheError::Closed)?;
        store.close().map_err(CacheError::Writer)
    }

    // == Internals ==
    /// Locks, runs cleanup, then `op`, mapping store failures with `wrap`.
    fn with_state<T>(
        &self,
        wrap: fn(StoreError) -> CacheError,
        op: impl FnOnce(&Self, &mut SlotFileStore<K>, &mut CacheStats) -> StoreResult<T>,
    ) -> Result<T> {
        let mut guard = self.state.lock();
        let ControllerState { store, stats } = &mut *guard;
        let store = store.as_mut().ok_or(CacheError::Closed)?;
        self.clean_up_locked(store, stats).map_err(wrap)?;
        op(self, store, stats).map_err(wrap)
    }

    fn load_locked(
        &self,
        store: &mut SlotFileStore<K>,
        stats: &mut CacheStats,
        key: &K,
    ) -> StoreResult<Option<V>> {
        match store.get(key)? {
            Some(bytes) => {
                if store.options().eviction_order.tracks_reads() {
                    store.touch(key);
                }
                stats.record_lookup(true);
                self.value_codec.decode(&bytes).map(Some)
            }
            None => {
                stats.record_lookup(false);
                Ok(None)
            }
        }
    }

    /// Removes expired entries, then evicts from the minimum end of the
    /// eviction index until the limits hold.
    ///
    /// In expiry order the expired entries sit at the minimum end. A
    /// recency order can hold them anywhere, so they are swept from the
    /// whole index before any live entry is evicted for capacity.
    fn clean_up_locked(
        &self,
        store: &mut SlotFileStore<K>,
        stats: &mut CacheStats,
    ) -> StoreResult<usize> {
        let now = current_timestamp_ms();
        let mut removed = 0;

        if store.options().eviction_order.tracks_reads() {
            for entry in store.expired_entries(now) {
                self.evict_entry(store, &entry)?;
                stats.record_removal(Removal::Expired);
                removed += 1;
            }
        }

        loop {
            let (victim, removal) = match store.eviction_index().minimum() {
                Some(entry) if is_expired(entry.expire_at, now) => {
                    (entry.clone(), Removal::Expired)
                }
                Some(entry) if self.limits.exceeded(store.len(), store.live_bytes()) => {
                    (entry.clone(), Removal::Evicted)
                }
                _ => break,
            };

            self.evict_entry(store, &victim)?;
            stats.record_removal(removal);
            removed += 1;
        }

        if removed > 0 {
            debug!(removed, remaining = store.len(), "Cleanup pass evicted entries");
        }
        Ok(removed)
    }

    fn evict_entry(
        &self,
        store: &mut SlotFileStore<K>,
        entry: &EvictionEntry<K>,
    ) -> StoreResult<()> {
        (self.evict)(store, entry)?;
        if store.contains_key(&entry.key) {
            warn!("Evict hook left its entry in place, deleting it");
            store.delete(&entry.key)?;
        }
        Ok(())
    }
}

impl<K, V> Drop for CacheController<K, V> {
    fn drop(&mut self) {
        if self.state.get_mut().store.is_some() {
            info!("Cache dropped without close, backing file left as is");
        }
    }
}

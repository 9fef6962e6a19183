//! Slot File Store Module
//!
//! Owns the backing file: a sequence of slots (header + payload) that are
//! appended at end-of-file, reused in place, tombstoned on delete and
//! compacted by [`SlotFileStore::defragment`].
//!
//! In-memory state (live slot table, free list, eviction index) is rebuilt by
//! a single sequential scan in [`SlotFileStore::load`]; there is no other log.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::codec::Codec;
use crate::cache::eviction::{EvictionEntry, EvictionOrder};
use crate::cache::index::EvictionIndex;
use crate::cache::slot::{current_timestamp_ms, is_expired, Slot, SlotHeader, HEADER_LEN};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};

// == Store Options ==
/// Construction-time settings of a [`SlotFileStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub eviction_order: EvictionOrder,
    /// Remove the backing file on close instead of keeping it
    pub delete_on_close: bool,
    /// Lost space (bytes) above which close defragments the file
    pub defrag_threshold: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            eviction_order: EvictionOrder::default(),
            delete_on_close: false,
            defrag_threshold: 1024 * 1024,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            eviction_order: config.eviction_order,
            delete_on_close: config.delete_on_close,
            defrag_threshold: config.defrag_threshold,
        }
    }
}

/// Outcome of a load scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub live: usize,
    pub free: usize,
    /// Slots that were valid on disk but already past their expiry
    pub expired: usize,
}

/// Outcome of a defragmentation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DefragSummary {
    pub slots_kept: usize,
    pub slots_dropped: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Where `put` found the slot it is writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    InPlace,
    FreeList,
    Appended,
}

// == Slot File Store ==
/// Persistent key → payload store over a single slot file.
pub struct SlotFileStore<K> {
    path: PathBuf,
    file: File,
    file_len: u64,
    slots: HashMap<K, Slot>,
    free: Vec<Slot>,
    index: EvictionIndex<EvictionEntry<K>>,
    key_codec: Box<dyn Codec<K>>,
    options: StoreOptions,
    access_clock: u64,
    live_bytes: u64,
}

impl<K> SlotFileStore<K>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Opens (or creates) the backing file at `path` and loads its slots.
    pub fn open(
        path: impl AsRef<Path>,
        key_codec: impl Codec<K> + 'static,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_file(&path)?;

        let mut store = Self {
            path,
            file,
            file_len: 0,
            slots: HashMap::new(),
            free: Vec::new(),
            index: EvictionIndex::new(options.eviction_order.comparator()),
            key_codec: Box::new(key_codec),
            options,
            access_clock: 0,
            live_bytes: 0,
        };
        let summary = store.load()?;
        info!(
            path = %store.path.display(),
            live = summary.live,
            free = summary.free,
            expired = summary.expired,
            "Slot file loaded"
        );
        Ok(store)
    }

    // == Load ==
    /// Rebuilds the slot table, free list and eviction index from disk.
    ///
    /// Valid slots that are already expired are tombstoned in place and
    /// treated as free. A header that cannot be valid, or a payload running
    /// past end-of-file, fails with [`StoreError::Corrupt`].
    pub fn load(&mut self) -> StoreResult<LoadSummary> {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.live_bytes = 0;

        let now = current_timestamp_ms();
        let file_len = self.file.metadata()?.len();
        let mut summary = LoadSummary::default();
        let mut tombstones = Vec::new();

        let mut reader = BufReader::new(&self.file);
        reader.seek(SeekFrom::Start(0))?;
        let mut offset = 0u64;

        while offset < file_len {
            if file_len - offset < HEADER_LEN {
                return Err(StoreError::corrupt(offset, "truncated slot header"));
            }
            let mut buf = [0u8; HEADER_LEN as usize];
            reader.read_exact(&mut buf)?;
            let header = SlotHeader::decode(&buf, offset)?;
            let mut slot = Slot::from_header(offset, &header);
            if slot.end() > file_len {
                return Err(StoreError::corrupt(
                    offset,
                    format!("slot payload ends at {} past end of file {}", slot.end(), file_len),
                ));
            }

            let mut consumed = 0u64;
            if header.valid && slot.is_expired(now) {
                warn!(offset, "Slot expired while stored, reclaiming");
                tombstones.push(offset);
                summary.expired += 1;
                self.free.push(slot.clone());
            } else if header.valid {
                let mut key_bytes = vec![0u8; header.key_len as usize];
                reader.read_exact(&mut key_bytes)?;
                consumed = u64::from(header.key_len);
                let key = self.key_codec.decode(&key_bytes)?;

                self.access_clock += 1;
                let handle = self.index.insert(EvictionEntry {
                    key: key.clone(),
                    expire_at: slot.expire_at,
                    last_access: self.access_clock,
                });
                slot.eviction_handle = Some(handle);
                self.live_bytes += slot.payload_len();

                if let Some(mut older) = self.slots.insert(key, slot.clone()) {
                    // Two valid slots for one key: the later one wins.
                    if let Some(h) = older.eviction_handle.take() {
                        self.index.remove(h);
                    }
                    self.live_bytes -= older.payload_len();
                    tombstones.push(older.offset);
                    self.free.push(older);
                }
                summary.live += 1;
            } else {
                self.free.push(slot.clone());
            }

            let skip = u64::from(slot.capacity) - consumed;
            reader.seek_relative(skip as i64)?;
            offset = slot.end();
        }
        drop(reader);

        for offset in tombstones {
            self.write_valid(offset, false)?;
        }

        self.file_len = file_len;
        summary.live = self.slots.len();
        summary.free = self.free.len();
        Ok(summary)
    }

    // == Get ==
    /// Reads the value bytes stored under `key`.
    ///
    /// Returns None when the key is absent or its entry has expired.
    pub fn get(&mut self, key: &K) -> StoreResult<Option<Vec<u8>>> {
        let (offset, len) = match self.slots.get(key) {
            Some(slot) if !slot.is_expired(current_timestamp_ms()) => {
                (slot.value_offset(), slot.value_len as usize)
            }
            _ => return Ok(None),
        };
        self.read_at(offset, len).map(Some)
    }

    // == Put ==
    /// Writes `value` under `key` with an absolute expiry (Unix ms).
    ///
    /// Slot selection, in order: the key's own slot if large enough, the
    /// first free slot that fits, a new slot at end-of-file. A key whose slot
    /// is too small has that slot tombstoned first. When the write fails the
    /// chosen slot goes back to where it came from.
    pub fn put(&mut self, key: K, value: &[u8], expire_at: u64) -> StoreResult<()> {
        let key_bytes = self.key_codec.encode(&key)?;
        let key_len = length_u32(key_bytes.len(), "key")?;
        let value_len = length_u32(value.len(), "value")?;
        let need = u64::from(key_len) + u64::from(value_len);
        if need > u64::from(u32::MAX) {
            return Err(StoreError::TooLarge {
                what: "entry",
                bytes: need,
            });
        }

        let (mut slot, placement) = match self.slots.get(&key).cloned() {
            Some(existing) if u64::from(existing.capacity) >= need => {
                debug!(offset = existing.offset, "Reusing live slot in place");
                (existing, Placement::InPlace)
            }
            Some(_) => {
                self.tombstone(&key)?;
                self.allocate(need)
            }
            None => self.allocate(need),
        };

        slot.key_len = key_len;
        slot.value_len = value_len;
        slot.expire_at = expire_at;

        let mut buf = Vec::with_capacity(HEADER_LEN as usize + need as usize);
        buf.extend_from_slice(&slot.header(true).encode());
        buf.extend_from_slice(&key_bytes);
        buf.extend_from_slice(value);
        if let Err(e) = self.write_at(slot.offset, &buf) {
            self.abandon(slot, placement);
            return Err(e);
        }
        if let Some(previous) = self.slots.get(&key) {
            self.live_bytes -= previous.payload_len();
        }

        self.access_clock += 1;
        let clock = self.access_clock;
        let refreshed = slot.eviction_handle.is_some_and(|h| {
            self.index.update(h, |entry| {
                entry.expire_at = expire_at;
                entry.last_access = clock;
            })
        });
        if !refreshed {
            slot.eviction_handle = Some(self.index.insert(EvictionEntry {
                key: key.clone(),
                expire_at,
                last_access: clock,
            }));
        }

        self.live_bytes += slot.payload_len();
        self.slots.insert(key, slot);
        Ok(())
    }

    // == Delete ==
    /// Tombstones the key's slot and moves it to the free list.
    ///
    /// Returns false when the key was absent.
    pub fn delete(&mut self, key: &K) -> StoreResult<bool> {
        self.tombstone(key)
    }

    // == Touch ==
    /// Marks `key` as just accessed and repositions it in the eviction index.
    pub fn touch(&mut self, key: &K) -> bool {
        let handle = match self.slots.get(key).and_then(|s| s.eviction_handle) {
            Some(h) => h,
            None => return false,
        };
        self.access_clock += 1;
        let clock = self.access_clock;
        self.index.update(handle, |entry| entry.last_access = clock)
    }

    // == Lost Space ==
    /// Bytes reclaimable by defragmentation: unused capacity of live slots
    /// plus the full size of every free slot.
    pub fn lost_space(&self) -> u64 {
        let slack: u64 = self.slots.values().map(Slot::slack).sum();
        let free: u64 = self
            .free
            .iter()
            .map(|s| u64::from(s.capacity) + HEADER_LEN)
            .sum();
        slack + free
    }

    // == Defragment ==
    /// Rewrites the file keeping only live slots, then swaps it in place.
    ///
    /// Each live slot is copied verbatim with its full capacity, so padding
    /// travels along. If the rename fails the original file is untouched.
    pub fn defragment(&mut self) -> StoreResult<DefragSummary> {
        let bytes_before = self.file_len;
        let tmp_path = self.temp_path();

        let mut live: Vec<(K, u64, u64)> = self
            .slots
            .iter()
            .map(|(k, s)| (k.clone(), s.offset, HEADER_LEN + u64::from(s.capacity)))
            .collect();
        live.sort_by_key(|(_, offset, _)| *offset);

        let (relocated, compacted) = match self.copy_live_slots(&tmp_path, &live) {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        self.file = compacted;

        let mut bytes_after = 0;
        for ((key, _, len), new_offset) in live.iter().zip(relocated) {
            if let Some(slot) = self.slots.get_mut(key) {
                slot.offset = new_offset;
            }
            bytes_after = new_offset + len;
        }

        let summary = DefragSummary {
            slots_kept: live.len(),
            slots_dropped: self.free.len(),
            bytes_before,
            bytes_after,
        };
        self.free.clear();
        self.file_len = bytes_after;

        info!(
            kept = summary.slots_kept,
            dropped = summary.slots_dropped,
            bytes_before,
            bytes_after,
            "Slot file defragmented"
        );
        Ok(summary)
    }

    /// Writes the live slots to `tmp_path` and returns their new offsets with
    /// a read/write handle on the copy.
    fn copy_live_slots(
        &mut self,
        tmp_path: &Path,
        live: &[(K, u64, u64)],
    ) -> StoreResult<(Vec<u64>, File)> {
        let tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut writer = BufWriter::new(tmp);
        let mut relocated = Vec::with_capacity(live.len());
        let mut new_offset = 0u64;

        for (_, offset, len) in live {
            let bytes = self.read_at(*offset, *len as usize)?;
            writer.write_all(&bytes)?;
            relocated.push(new_offset);
            new_offset += len;
        }

        let tmp = writer.into_inner().map_err(|e| e.into_error())?;
        tmp.sync_all()?;
        Ok((relocated, tmp))
    }

    // == Close ==
    /// Releases the backing file.
    ///
    /// With delete-on-close the file is removed, otherwise it is defragmented
    /// first when lost space exceeds the configured threshold.
    pub fn close(mut self) -> StoreResult<()> {
        if self.options.delete_on_close {
            let path = self.path.clone();
            drop(self);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to delete slot file");
            }
            return Ok(());
        }

        let lost = self.lost_space();
        if lost > self.options.defrag_threshold {
            info!(lost, threshold = self.options.defrag_threshold, "Defragmenting on close");
            self.defragment()?;
        }
        self.file.sync_all()?;
        info!(path = %self.path.display(), entries = self.slots.len(), "Slot file closed");
        Ok(())
    }

    // == Accessors ==
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    /// Descriptor of the key's live slot.
    pub fn slot(&self, key: &K) -> Option<&Slot> {
        self.slots.get(key)
    }

    pub fn free_slots(&self) -> &[Slot] {
        &self.free
    }

    /// Sum of key and value lengths over live slots.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn eviction_index(&self) -> &EvictionIndex<EvictionEntry<K>> {
        &self.index
    }

    /// Eviction entries whose expiry has passed, in eviction order.
    pub fn expired_entries(&self, now_ms: u64) -> Vec<EvictionEntry<K>> {
        self.index
            .iter()
            .filter(|e| is_expired(e.expire_at, now_ms))
            .cloned()
            .collect()
    }

    // == Internals ==
    /// Picks a free slot that fits (first fit) or appends a new one.
    fn allocate(&mut self, need: u64) -> (Slot, Placement) {
        if let Some(pos) = self
            .free
            .iter()
            .position(|s| u64::from(s.capacity) >= need)
        {
            let slot = self.free.swap_remove(pos);
            debug!(offset = slot.offset, capacity = slot.capacity, need, "Reusing free slot");
            return (slot, Placement::FreeList);
        }

        let offset = self.file_len;
        self.file_len += HEADER_LEN + need;
        debug!(offset, capacity = need, "Appending new slot");
        let slot = Slot {
            offset,
            capacity: need as u32,
            key_len: 0,
            value_len: 0,
            expire_at: 0,
            eviction_handle: None,
        };
        (slot, Placement::Appended)
    }

    /// Hands a slot back after its write failed. An in-place slot is still
    /// registered under its key and needs nothing.
    fn abandon(&mut self, mut slot: Slot, placement: Placement) {
        match placement {
            Placement::InPlace => {}
            Placement::FreeList => {
                if let Err(e) = self.write_valid(slot.offset, false) {
                    warn!(offset = slot.offset, error = %e, "Failed to re-tombstone slot");
                }
                slot.eviction_handle = None;
                self.free.push(slot);
            }
            Placement::Appended => {
                self.file_len = slot.offset;
                if let Err(e) = self.file.set_len(slot.offset) {
                    warn!(offset = slot.offset, error = %e, "Failed to truncate partial slot");
                }
            }
        }
    }

    /// Flips the key's valid bit on disk, then moves its slot to the free
    /// list. Memory is untouched when the disk write fails.
    fn tombstone(&mut self, key: &K) -> StoreResult<bool> {
        let offset = match self.slots.get(key) {
            Some(slot) => slot.offset,
            None => return Ok(false),
        };
        self.write_valid(offset, false)?;

        if let Some(mut slot) = self.slots.remove(key) {
            self.live_bytes -= slot.payload_len();
            if let Some(handle) = slot.eviction_handle.take() {
                self.index.remove(handle);
            }
            self.free.push(slot);
        }
        Ok(true)
    }

    fn write_valid(&mut self, offset: u64, valid: bool) -> StoreResult<()> {
        self.write_at(offset, &[u8::from(valid)])
    }

    fn read_at(&mut self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".defrag");
        self.path.with_file_name(name)
    }
}

fn open_file(path: &Path) -> StoreResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

fn length_u32(len: usize, what: &'static str) -> StoreResult<u32> {
    u32::try_from(len).map_err(|_| StoreError::TooLarge {
        what,
        bytes: len as u64,
    })
}

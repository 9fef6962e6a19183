//! Slot Module
//!
//! On-disk slot header layout and the in-memory slot descriptor.
//!
//! Every slot is a fixed 21-byte little-endian header followed by a payload
//! region of `capacity` bytes:
//!
//! ```text
//! [valid:1][capacity:4][key_len:4][value_len:4][expire_at:8][key bytes][value bytes][padding]
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::index::NodeId;
use crate::error::{StoreError, StoreResult};

// == Layout Constants ==
/// Size of a slot header in bytes.
pub const HEADER_LEN: u64 = 21;

/// Expiry sentinel for entries that never expire.
pub const NEVER: u64 = u64::MAX;

const VALID_OFFSET: usize = 0;
const CAPACITY_OFFSET: usize = 1;
const KEY_LEN_OFFSET: usize = 5;
const VALUE_LEN_OFFSET: usize = 9;
const EXPIRE_OFFSET: usize = 13;

// == Slot Header ==
/// Decoded form of the 21 header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    pub valid: bool,
    pub capacity: u32,
    pub key_len: u32,
    pub value_len: u32,
    /// Expiry as Unix milliseconds, [`NEVER`] for no expiry
    pub expire_at: u64,
}

impl SlotHeader {
    /// Encodes the header into its fixed on-disk representation.
    pub fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[VALID_OFFSET] = u8::from(self.valid);
        buf[CAPACITY_OFFSET..KEY_LEN_OFFSET].copy_from_slice(&self.capacity.to_le_bytes());
        buf[KEY_LEN_OFFSET..VALUE_LEN_OFFSET].copy_from_slice(&self.key_len.to_le_bytes());
        buf[VALUE_LEN_OFFSET..EXPIRE_OFFSET].copy_from_slice(&self.value_len.to_le_bytes());
        buf[EXPIRE_OFFSET..].copy_from_slice(&self.expire_at.to_le_bytes());
        buf
    }

    /// Decodes a header read at `offset`, rejecting values no writer produces.
    pub fn decode(buf: &[u8; HEADER_LEN as usize], offset: u64) -> StoreResult<Self> {
        let valid = match buf[VALID_OFFSET] {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::corrupt(
                    offset,
                    format!("valid byte is {other}, expected 0 or 1"),
                ))
            }
        };
        let header = Self {
            valid,
            capacity: read_u32(buf, CAPACITY_OFFSET),
            key_len: read_u32(buf, KEY_LEN_OFFSET),
            value_len: read_u32(buf, VALUE_LEN_OFFSET),
            expire_at: u64::from_le_bytes(read_array(buf, EXPIRE_OFFSET)),
        };

        if header.payload_len() > u64::from(header.capacity) {
            return Err(StoreError::corrupt(
                offset,
                format!(
                    "payload of {} bytes exceeds capacity {}",
                    header.payload_len(),
                    header.capacity
                ),
            ));
        }
        Ok(header)
    }

    /// Bytes actually occupied by key and value.
    pub fn payload_len(&self) -> u64 {
        u64::from(self.key_len) + u64::from(self.value_len)
    }
}

fn read_array<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(read_array(buf, at))
}

// == Slot ==
/// In-memory descriptor of a slot, live or free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Byte offset of the header in the backing file
    pub offset: u64,
    /// Bytes reserved after the header for key and value
    pub capacity: u32,
    pub key_len: u32,
    pub value_len: u32,
    /// Expiry as Unix milliseconds, [`NEVER`] for no expiry
    pub expire_at: u64,
    /// Position in the eviction index, None while (re)inserting or when free
    pub eviction_handle: Option<NodeId>,
}

impl Slot {
    /// Builds a descriptor from a header read at `offset`.
    pub fn from_header(offset: u64, header: &SlotHeader) -> Self {
        Self {
            offset,
            capacity: header.capacity,
            key_len: header.key_len,
            value_len: header.value_len,
            expire_at: header.expire_at,
            eviction_handle: None,
        }
    }

    pub fn header(&self, valid: bool) -> SlotHeader {
        SlotHeader {
            valid,
            capacity: self.capacity,
            key_len: self.key_len,
            value_len: self.value_len,
            expire_at: self.expire_at,
        }
    }

    /// Offset of the first key byte.
    pub fn key_offset(&self) -> u64 {
        self.offset + HEADER_LEN
    }

    /// Offset of the first value byte.
    pub fn value_offset(&self) -> u64 {
        self.key_offset() + u64::from(self.key_len)
    }

    /// Offset just past the slot's payload region.
    pub fn end(&self) -> u64 {
        self.key_offset() + u64::from(self.capacity)
    }

    pub fn payload_len(&self) -> u64 {
        u64::from(self.key_len) + u64::from(self.value_len)
    }

    /// Capacity reserved but not used by the current occupant.
    pub fn slack(&self) -> u64 {
        u64::from(self.capacity) - self.payload_len()
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        is_expired(self.expire_at, now_ms)
    }
}

// == Expiry Helpers ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Absolute expiry for an entry written at `now_ms` with the given TTL.
pub fn expire_at_from_ttl(now_ms: u64, ttl: Option<Duration>) -> u64 {
    match ttl {
        Some(ttl) => now_ms.saturating_add(ttl.as_millis() as u64).min(NEVER - 1),
        None => NEVER,
    }
}

/// Boundary condition: an entry is expired once `now >= expire_at`.
pub fn is_expired(expire_at: u64, now_ms: u64) -> bool {
    expire_at != NEVER && now_ms >= expire_at
}

//! Cache Module
//!
//! Persistent slot-file storage with an eviction index for expiry and
//! capacity-based eviction.

mod codec;
mod controller;
mod eviction;
mod file_store;
mod index;
mod slot;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::{Codec, JsonCodec, RawCodec, Utf8Codec};
pub use controller::{CacheController, CapacityLimits, EvictHook};
pub use eviction::{EvictionEntry, EvictionOrder};
pub use file_store::{DefragSummary, LoadSummary, SlotFileStore, StoreOptions};
pub use index::{CompareFn, EvictionIndex, Iter, NodeId};
pub use slot::{current_timestamp_ms, Slot, SlotHeader, HEADER_LEN, NEVER};
pub use stats::{CacheStats, Removal};

// == Public Constants ==
/// Maximum allowed key length in bytes accepted by the HTTP API
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes accepted by the HTTP API
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

//! Slot Cache - a persistent, capacity-bounded, expiring key/value cache
//!
//! Entries live in a single slot file with in-place reuse, a free list and
//! defragmentation. A self-adjusting sorted index decides eviction order.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::{AppState, StringCache};
pub use cache::{CacheController, SlotFileStore};
pub use config::Config;
pub use error::{CacheError, StoreError};
pub use tasks::spawn_maintenance_task;

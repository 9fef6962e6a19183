//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::EvictionOrder;

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the backing file
    pub directory: PathBuf,
    /// Name of the backing file inside `directory`
    pub file_name: String,
    /// Maximum number of live entries, 0 = unbounded
    pub max_entries: usize,
    /// Maximum live payload bytes (key + value), 0 = unbounded
    pub max_bytes: u64,
    /// Default TTL in seconds for entries without explicit TTL, 0 = never expires
    pub default_ttl: u64,
    /// Which entries are evicted first when over capacity
    pub eviction_order: EvictionOrder,
    /// Remove the backing file when the cache is closed
    pub delete_on_close: bool,
    /// Lost space (bytes) above which close/maintenance defragments the file
    pub defrag_threshold: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background maintenance interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Directory of the backing file (default: system temp dir)
    /// - `CACHE_FILE` - Backing file name (default: slot_cache.dat)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `MAX_BYTES` - Maximum live payload bytes (default: 0, unbounded)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `EVICTION_ORDER` - `expiry` or `lru` (default: expiry)
    /// - `DELETE_ON_CLOSE` - Remove the file on shutdown (default: false)
    /// - `DEFRAG_THRESHOLD` - Lost bytes before defragmenting (default: 1 MiB)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Maintenance frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            directory: env::var("CACHE_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.directory),
            file_name: env::var("CACHE_FILE").unwrap_or(defaults.file_name),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_bytes: parse_var("MAX_BYTES").unwrap_or(defaults.max_bytes),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            eviction_order: parse_var("EVICTION_ORDER").unwrap_or(defaults.eviction_order),
            delete_on_close: parse_var("DELETE_ON_CLOSE").unwrap_or(defaults.delete_on_close),
            defrag_threshold: parse_var("DEFRAG_THRESHOLD").unwrap_or(defaults.defrag_threshold),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }

    /// Full path of the backing file.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    /// Default TTL as a duration, None when entries never expire by default.
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl > 0).then(|| Duration::from_secs(self.default_ttl))
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: env::temp_dir(),
            file_name: "slot_cache.dat".to_string(),
            max_entries: 1000,
            max_bytes: 0,
            default_ttl: 300,
            eviction_order: EvictionOrder::Expiry,
            delete_on_close: false,
            defrag_threshold: 1024 * 1024,
            server_port: 3000,
            cleanup_interval: 1,
        }
    }
}

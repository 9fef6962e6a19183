//! Response DTOs
//!
//! Outgoing JSON bodies. Stats and defrag reports flatten the cache's own
//! types so the wire shape follows the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheStats, DefragSummary};

/// Body of a successful `GET /get/:key`.
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Acknowledges a write or delete of a single key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    pub message: String,
    pub key: String,
}

impl KeyResponse {
    pub fn stored(key: impl Into<String>) -> Self {
        Self::with_verb(key.into(), "stored")
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        Self::with_verb(key.into(), "deleted")
    }

    fn with_verb(key: String, verb: &str) -> Self {
        Self {
            message: format!("key '{key}' {verb}"),
            key,
        }
    }
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Body of `POST /defrag`.
#[derive(Debug, Clone, Serialize)]
pub struct DefragResponse {
    #[serde(flatten)]
    pub summary: DefragSummary,
    /// Bytes removed from the backing file
    pub reclaimed: u64,
}

impl From<DefragSummary> for DefragResponse {
    fn from(summary: DefragSummary) -> Self {
        Self {
            reclaimed: summary.bytes_before.saturating_sub(summary.bytes_after),
            summary,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            timestamp: Utc::now(),
        }
    }
}

/// Error body returned for every failing request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

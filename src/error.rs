//! Error types for the slot cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Store Error Enum ==
/// Failures raised by the slot file store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Disk read/write/seek failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header or payload on disk cannot be valid
    #[error("Corrupt store at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// Key or value could not be encoded/decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// An entry does not fit the u32 length fields of a slot header
    #[error("{what} of {bytes} bytes exceeds the slot size limit")]
    TooLarge { what: &'static str, bytes: u64 },
}

impl StoreError {
    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for store-level operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Cache Error Enum ==
/// Unified error type for the public cache surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading from the backing store failed
    #[error("Cache loader failed: {0}")]
    Loader(#[source] StoreError),

    /// Writing to or deleting from the backing store failed
    #[error("Cache writer failed: {0}")]
    Writer(#[source] StoreError),

    /// The cache was closed and no longer owns its backing file
    #[error("Cache is closed")]
    Closed,

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Loader(_) | CacheError::Writer(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

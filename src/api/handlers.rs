//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Cache calls block
//! on disk I/O, so every handler runs them on the blocking thread pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{CacheController, Utf8Codec};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DefragResponse, GetResponse, HealthResponse, KeyResponse, RequestedTtl, SetRequest,
    StatsResponse,
};

/// Cache served over HTTP: UTF-8 keys and values.
pub type StringCache = CacheController<String, String>;

/// Application state shared across all handlers.
///
/// The cache serializes access internally, so a plain Arc is enough.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache controller
    pub cache: Arc<StringCache>,
}

impl AppState {
    /// Creates a new AppState around an opened cache.
    pub fn new(cache: StringCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Opens the backing file named by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = StringCache::open(config, Utf8Codec, Utf8Codec)?;
        Ok(Self::new(cache))
    }
}

/// Runs a blocking cache call off the async executor.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&StringCache) -> Result<T> + Send + 'static,
{
    let cache = state.cache.clone();
    tokio::task::spawn_blocking(move || f(&cache))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))?
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<KeyResponse>> {
    req.validate()?;

    let key = req.key.clone();
    let ttl = req.requested_ttl();
    blocking(&state, move |cache| match ttl {
        RequestedTtl::Default => cache.write(req.key, &req.value),
        RequestedTtl::Never => cache.write_with_ttl(req.key, &req.value, None),
        RequestedTtl::After(ttl) => cache.write_with_ttl(req.key, &req.value, Some(ttl)),
    })
    .await?;

    Ok(Json(KeyResponse::stored(key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let value = blocking(&state, move |cache| cache.load(&lookup)).await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyResponse>> {
    let target = key.clone();
    let existed = blocking(&state, move |cache| cache.delete(&target)).await?;

    if existed {
        Ok(Json(KeyResponse::deleted(key)))
    } else {
        Err(CacheError::NotFound(key))
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = blocking(&state, |cache| Ok(cache.stats())).await?;
    Ok(Json(StatsResponse::from(stats)))
}

/// Handler for POST /defrag
///
/// Compacts the backing file on demand.
pub async fn defrag_handler(State(state): State<AppState>) -> Result<Json<DefragResponse>> {
    let summary = blocking(&state, |cache| cache.defragment()).await?;
    Ok(Json(DefragResponse::from(summary)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

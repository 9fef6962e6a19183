//! Maintenance Task
//!
//! Background task that periodically purges expired cache entries and
//! compacts the slot file once enough space has been lost.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheController;
use crate::error::Result;

/// What one maintenance run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub purged: usize,
    pub defragmented: bool,
}

/// Spawns a background task that periodically maintains the cache.
///
/// Each run removes every expired entry and defragments the backing file
/// when its lost space exceeds `defrag_threshold`. Cache calls block on disk
/// I/O, so they run on the blocking thread pool. The task stops once the
/// cache has been closed.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_maintenance_task<K, V>(
    cache: Arc<CacheController<K, V>>,
    interval_secs: u64,
    defrag_threshold: u64,
) -> JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: 'static,
{
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            if cache.is_closed() {
                info!("Cache closed, maintenance task exiting");
                break;
            }

            let cache = cache.clone();
            let run = tokio::task::spawn_blocking(move || run_once(&cache, defrag_threshold)).await;

            match run {
                Ok(Ok(report)) if report.purged > 0 || report.defragmented => {
                    info!(
                        purged = report.purged,
                        defragmented = report.defragmented,
                        "Maintenance run finished"
                    );
                }
                Ok(Ok(_)) => debug!("Maintenance: nothing to do"),
                Ok(Err(e)) => error!("Maintenance run failed: {}", e),
                Err(e) => error!("Maintenance task panicked: {}", e),
            }
        }
    })
}

/// Performs a single maintenance run.
pub fn run_once<K, V>(cache: &CacheController<K, V>, defrag_threshold: u64) -> Result<MaintenanceReport>
where
    K: Hash + Eq + Clone,
{
    let purged = cache.purge_expired()?;
    let defragmented = if cache.lost_space() > defrag_threshold {
        cache.defragment()?;
        true
    } else {
        false
    };
    Ok(MaintenanceReport {
        purged,
        defragmented,
    })
}

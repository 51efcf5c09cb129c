//! Cleanup Task
//!
//! Background task that periodically sweeps expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::context::Context;

/// Spawns a background task that runs [`Cache::cleanup`] every `interval`.
///
/// Each sweep holds the cache's exclusive lock for a full scan, so the
/// interval should be long enough that sweeps stay off the request hot path.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::in_memory());
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<Cache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs_f64(), "Starting cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let sweep_cache = cache.clone();
            let outcome =
                tokio::task::spawn_blocking(move || sweep_cache.cleanup(&Context::background()))
                    .await;

            match outcome {
                Ok(Ok(removed)) if removed > 0 => {
                    info!(removed, "Cleanup removed expired entries");
                }
                Ok(Ok(_)) => debug!("Cleanup found no expired entries"),
                Ok(Err(e)) => warn!(error = %e, "Cleanup skipped"),
                Err(e) => warn!(error = %e, "Cleanup task panicked"),
            }
        }
    })
}

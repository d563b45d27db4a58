//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries, bounding
//! the memory held by stale entries that are never read again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedStore;

/// Handle to a running sweep task.
///
/// The task stops on `dispose` or when the handle is dropped.
#[derive(Debug)]
pub struct SweepTask {
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Stops the sweep loop.
    pub fn dispose(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The write lock is held only for the duration of one sweep.
///
/// # Example
/// ```ignore
/// let store = CacheStore::from_config(&config).shared();
/// let sweep = spawn_sweep_task(store.clone(), config.sweep_interval());
/// // Later, during shutdown:
/// sweep.dispose();
/// ```
pub fn spawn_sweep_task(store: SharedStore, interval: Duration) -> SweepTask {
    let handle = tokio::spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut store_guard = store.write().await;
                store_guard.sweep()
            };

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    });

    SweepTask { handle }
}

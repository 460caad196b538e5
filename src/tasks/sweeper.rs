//! Expiration Sweeper Task
//!
//! Background task that periodically removes entries whose deadline passed
//! without their expiration timer removing them.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{ExpiringStore, StoreValue};

/// Spawns a background task that sweeps the store at a fixed interval.
///
/// Every entry normally expires through its own timer, so a sweep that finds
/// anything means timers are being lost; those sweeps are logged at warn
/// level. The task holds a store handle and runs until aborted.
///
/// # Arguments
/// * `store` - Handle to the store to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = ExpiringStore::with_config(&config);
/// let sweeper = spawn_sweeper(store.clone(), config.sweep_interval());
/// // Later, during shutdown:
/// sweeper.abort();
/// ```
pub fn spawn_sweeper<T: StoreValue>(store: ExpiringStore<T>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting expiration sweeper");

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = store.purge_expired();
            if removed > 0 {
                warn!(removed, "Sweep removed entries that outlived their timers");
            } else {
                debug!(entries = store.len(), "Sweep found nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_entries_with_lost_timers() {
        let store = ExpiringStore::new();
        store.insert_without_timer("orphan", 1, Instant::now() + Duration::from_secs(1));

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(store.stats().swept, 1);
        assert!(store.get("orphan").is_none());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_preserves_valid_entries() {
        let store = ExpiringStore::new();
        store.set("long_lived", "value".to_string(), Some(Duration::from_secs(3600)));
        store.set("persistent", "value".to_string(), None);

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.get_scalar("long_lived"), Some("value".to_string()));
        assert_eq!(store.get_scalar("persistent"), Some("value".to_string()));
        assert_eq!(store.stats().swept, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let store: ExpiringStore<String> = ExpiringStore::new();

        let handle = spawn_sweeper(store, Duration::from_secs(1));

        // Abort immediately
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled(), "Task should be cancelled after abort");
    }
}

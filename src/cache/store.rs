//! Expiring Store Module
//!
//! Concurrent keyed store combining scalar and list entries, per-key
//! expiration timers and fixed-window rate-limit buckets.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::cache::value::insert_block;
use crate::cache::{Bucket, Entry, Position, Shape, StatsRecorder, StoreStats, StoredValue};
use crate::config::Config;
use crate::error::{Result, StoreError};

/// How long past its deadline an entry may linger before the sweeper treats
/// its timer as lost.
pub const TIMER_GRACE: Duration = Duration::from_secs(1);

// == Store Value ==
/// Bounds a type must meet to be stored.
///
/// Equality is structural: list lookups compare with `PartialEq`.
pub trait StoreValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// State shared by every handle to one store.
struct Shared<T> {
    entries: DashMap<String, Entry<T>>,
    buckets: DashMap<String, Bucket>,
    stats: StatsRecorder,
    generations: AtomicU64,
    runtime: Handle,
    default_ttl: Option<Duration>,
}

impl<T> Shared<T> {
    /// Timer callback. Only removes the entry generation the timer was armed for.
    fn expire(&self, key: &str, generation: u64) {
        match self
            .entries
            .remove_if(key, |_, entry| entry.generation == generation)
        {
            Some(_) => {
                self.stats.record_expiration();
                debug!(key, generation, "entry expired");
            }
            None => trace!(key, generation, "stale expiration timer ignored"),
        }
    }
}

// == Expiring Store ==
/// Handle to an in-memory store whose entries remove themselves after a TTL.
///
/// Handles are cheap to clone and share the same entries. Operations on
/// different keys never wait on each other beyond the map's shard locks; all
/// operations on one key are serialized. Expiration timers run on the Tokio
/// runtime that was current when the store was built and hold only a weak
/// reference to the store, so dropping the last handle drops every entry and
/// aborts every outstanding timer.
///
/// # Example
/// ```rust,no_run
/// use std::time::Duration;
/// use expiring_store::ExpiringStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store: ExpiringStore<String> = ExpiringStore::new();
///     store.set("auto_reply:1a2b3c4d", "brb".to_string(), Some(Duration::from_secs(60)));
///     assert!(store.get("auto_reply:1a2b3c4d").is_some());
/// }
/// ```
pub struct ExpiringStore<T = serde_json::Value> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ExpiringStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: StoreValue> ExpiringStore<T> {
    // == Constructor ==
    /// Creates a store with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. The store needs a
    /// runtime handle to schedule expiration timers.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a store from configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn with_config(config: &Config) -> Self {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => panic!(
                "ExpiringStore requires a Tokio runtime. \
                 Construct it from within a #[tokio::main] or #[tokio::test] context, \
                 or from code running on a Tokio runtime."
            ),
        };

        Self {
            shared: Arc::new(Shared {
                entries: DashMap::new(),
                buckets: DashMap::new(),
                stats: StatsRecorder::default(),
                generations: AtomicU64::new(1),
                runtime,
                default_ttl: config.default_ttl(),
            }),
        }
    }

    /// Allocates a generation and, when a non-zero TTL applies, spawns the
    /// timer that expires that generation.
    ///
    /// Callers hold the key's slot while arming, so the timer cannot observe
    /// the key before the new entry is in place.
    fn arm(&self, key: &str, ttl: Option<Duration>) -> (u64, Option<Instant>, Option<AbortHandle>) {
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed);

        let Some(deadline) = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl))
        else {
            return (generation, None, None);
        };

        let shared = Arc::downgrade(&self.shared);
        let timer_key = key.to_owned();
        let task = self.shared.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(&timer_key, generation);
            }
        });

        debug!(key, generation, ?ttl, "expiration timer armed");
        (generation, Some(deadline), Some(task.abort_handle()))
    }

    // == Set ==
    /// Stores a scalar, replacing any previous scalar or list under `key`.
    ///
    /// The previous timer is cancelled. A `ttl` of `None` or zero leaves the
    /// entry in place until removed.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let slot = self.shared.entries.entry(key.into());
        let (generation, deadline, timer) = self.arm(slot.key(), ttl);
        // Replacing the old entry drops it, which aborts its timer.
        slot.insert(Entry::new(StoredValue::Scalar(value), generation, deadline).with_timer(timer));
    }

    /// Stores a scalar using the configured default TTL.
    pub fn put(&self, key: impl Into<String>, value: T) {
        self.set(key, value, self.shared.default_ttl);
    }

    // == Get ==
    /// Returns a copy of the value under `key`, scalar or whole list.
    ///
    /// An entry past its deadline reads as absent even if its timer has not
    /// run yet.
    pub fn get(&self, key: &str) -> Option<StoredValue<T>> {
        let found = self
            .shared
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone());

        self.shared.stats.record_lookup(found.is_some());
        found
    }

    /// Returns the scalar under `key`, `None` if absent or a list.
    pub fn get_scalar(&self, key: &str) -> Option<T> {
        self.get(key).and_then(StoredValue::into_scalar)
    }

    /// Returns the list under `key`, `None` if absent or a scalar.
    pub fn get_list(&self, key: &str) -> Option<Vec<T>> {
        self.get(key).and_then(StoredValue::into_list)
    }

    /// True if `key` holds a live entry of either shape.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Time To Live ==
    /// Remaining lifetime of `key`.
    ///
    /// `None` if absent, `Some(None)` if the entry never expires.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.shared
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining())
    }

    // == Remove ==
    /// Deletes `key` and cancels its timer. Returns whether a live entry existed.
    pub fn remove(&self, key: &str) -> bool {
        match self.shared.entries.remove(key) {
            Some((_, entry)) => {
                debug!(key, generation = entry.generation, "entry removed");
                !entry.is_expired()
            }
            None => false,
        }
    }

    // == List Append ==
    /// Inserts `values` as one block into the list under `key`, creating it if absent.
    ///
    /// Like every write, this supersedes the key's pending timer: with a TTL a
    /// fresh timer is installed, without one the list no longer expires.
    ///
    /// # Errors
    ///
    /// `StoreError::TypeMismatch` if `key` holds a scalar; the store is left unchanged.
    pub fn list_append<I>(
        &self,
        key: impl Into<String>,
        values: I,
        position: Position,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        // Caller code runs before the key's slot is locked
        let values: Vec<T> = values.into_iter().collect();

        match self.shared.entries.entry(key.into()) {
            Slot::Occupied(mut slot) if !slot.get().is_expired() => {
                let found = slot.get().value.shape();
                if found != Shape::List {
                    return Err(StoreError::TypeMismatch {
                        key: slot.key().clone(),
                        expected: Shape::List,
                        found,
                    });
                }

                let (generation, deadline, timer) = self.arm(slot.key(), ttl);
                let entry = slot.get_mut();
                if let StoredValue::List(items) = &mut entry.value {
                    insert_block(items, position, values);
                }
                entry.rearm(generation, deadline, timer);
            }
            slot => {
                let (generation, deadline, timer) = self.arm(slot.key(), ttl);
                slot.insert(Entry::new(StoredValue::List(values), generation, deadline).with_timer(timer));
            }
        }

        Ok(())
    }

    /// Prepends one value with no TTL.
    pub fn list_push(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.list_append(key, [value], Position::Front, None)
    }

    /// Runs `f` over the live list under `key`, if there is one.
    fn with_list<R>(&self, key: &str, f: impl FnOnce(&[T]) -> R) -> Option<R> {
        let entry = self.shared.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry.value.as_list().map(f)
    }

    // == List Reads ==
    /// True if the list under `key` holds an element equal to `value`.
    pub fn list_contains(&self, key: &str, value: &T) -> bool {
        self.with_list(key, |items| items.contains(value))
            .unwrap_or(false)
    }

    /// Distinct elements of the list under `key`, in stored order.
    ///
    /// `None` means nothing is cached: the key is absent or holds a scalar.
    pub fn list_members(&self, key: &str) -> Option<Vec<T>> {
        self.with_list(key, |items| {
            let mut distinct: Vec<T> = Vec::with_capacity(items.len());
            for item in items {
                if !distinct.contains(item) {
                    distinct.push(item.clone());
                }
            }
            distinct
        })
    }

    // == List Remove One ==
    /// Removes the first element equal to `value`. Returns whether one was removed.
    ///
    /// The timer is untouched, and an emptied list stays in place until the
    /// key itself is removed or expires.
    pub fn list_remove_one(&self, key: &str, value: &T) -> bool {
        let Some(mut entry) = self.shared.entries.get_mut(key) else {
            return false;
        };
        if entry.is_expired() {
            return false;
        }
        let StoredValue::List(items) = &mut entry.value else {
            return false;
        };

        match items.iter().position(|item| item == value) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    // == Keys ==
    /// Snapshot of the keys currently holding live entries.
    ///
    /// Meant for diagnostics; concurrent writes may or may not be reflected.
    pub fn keys(&self) -> Vec<String> {
        self.shared
            .entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect()
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.shared
            .entries
            .iter()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    /// Returns true if the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Rate Limiting ==
    /// Records a call against the bucket for `key` and returns true once the
    /// bucket has reached `limit` within its current window.
    ///
    /// `limit` and `window` only take effect on the first call for a key;
    /// later values are ignored until the bucket is reset.
    pub fn check_rate_limit(&self, key: impl Into<String>, limit: u32, window: Duration) -> bool {
        let mut bucket = self
            .shared
            .buckets
            .entry(key.into())
            .or_insert_with(|| Bucket::new(limit, window, Instant::now()));

        let limited = bucket.hit(Instant::now());
        if limited {
            self.shared.stats.record_rate_limited();
            trace!(key = %bucket.key(), count = bucket.count, limit = bucket.limit, "rate limit reached");
        }
        limited
    }

    /// True if the bucket for `key` is at its limit in a window that is still open.
    /// Does not record a call.
    pub fn is_rate_limited(&self, key: &str) -> bool {
        self.shared
            .buckets
            .get(key)
            .is_some_and(|bucket| bucket.is_limited(Instant::now()))
    }

    /// Time until the limited bucket for `key` opens a new window, zero if not limited.
    pub fn time_remaining(&self, key: &str) -> Duration {
        self.shared
            .buckets
            .get(key)
            .map(|bucket| bucket.time_remaining(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Forgets the bucket for `key`; the next check fixes new parameters.
    pub fn reset_rate_limit(&self, key: &str) -> bool {
        self.shared.buckets.remove(key).is_some()
    }

    // == Purge Expired ==
    /// Removes entries more than `TIMER_GRACE` past their deadline.
    ///
    /// A healthy timer removes its entry on time, so anything found here had
    /// its timer lost. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let overdue: Vec<(String, u64)> = self
            .shared
            .entries
            .iter()
            .filter(|entry| entry.is_overdue(TIMER_GRACE))
            .map(|entry| (entry.key().clone(), entry.generation))
            .collect();

        let mut removed = 0;
        for (key, generation) in overdue {
            let swept = self.shared.entries.remove_if(&key, |_, entry| {
                entry.generation == generation && entry.is_overdue(TIMER_GRACE)
            });
            if swept.is_some() {
                warn!(key = %key, generation, "entry outlived its expiration timer, swept");
                removed += 1;
            }
        }

        self.shared.stats.record_swept(removed);
        removed
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> StoreStats {
        self.shared.stats.snapshot(self.len())
    }

    /// Installs a scalar with a deadline but no timer, as if its timer had been lost.
    #[cfg(test)]
    pub(crate) fn insert_without_timer(&self, key: &str, value: T, deadline: Instant) {
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed);
        self.shared.entries.insert(
            key.to_string(),
            Entry::new(StoredValue::Scalar(value), generation, Some(deadline)),
        );
    }
}

impl<T: StoreValue> Default for ExpiringStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ExpiringStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("entries", &self.shared.entries.len())
            .field("buckets", &self.shared.buckets.len())
            .finish()
    }
}

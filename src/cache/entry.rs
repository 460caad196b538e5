//! Store Entry Module
//!
//! Defines a stored value together with its deadline and expiration timer.

use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};

use crate::cache::StoredValue;

// == Entry ==
/// A single key's value plus its optional expiration timer.
///
/// The timer is owned by the entry: dropping the entry (overwrite, removal,
/// expiration or dropping the whole store) aborts it.
#[derive(Debug)]
pub struct Entry<T> {
    /// The stored value
    pub value: StoredValue<T>,
    /// Stamp of the write that armed the current timer
    pub generation: u64,
    /// Deadline, None = no expiration
    pub expires_at: Option<Instant>,
    timer: Option<AbortHandle>,
}

impl<T> Entry<T> {
    // == Constructor ==
    /// Creates an entry with no timer attached yet.
    pub fn new(value: StoredValue<T>, generation: u64, expires_at: Option<Instant>) -> Self {
        Self {
            value,
            generation,
            expires_at,
            timer: None,
        }
    }

    /// Attaches the task that will expire this entry.
    pub fn with_timer(mut self, timer: Option<AbortHandle>) -> Self {
        self.timer = timer;
        self
    }

    // == Rearm ==
    /// Cancels the current timer and installs a replacement deadline.
    pub fn rearm(&mut self, generation: u64, expires_at: Option<Instant>, timer: Option<AbortHandle>) {
        self.cancel_timer();
        self.generation = generation;
        self.expires_at = expires_at;
        self.timer = timer;
    }

    /// Aborts the pending timer, if any. Idempotent.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    #[cfg(test)]
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    // == Is Expired ==
    /// Checks if the deadline has passed.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its deadline, whether or not its timer has run yet.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Checks if the deadline passed more than `grace` ago.
    pub fn is_overdue(&self, grace: Duration) -> bool {
        self.expires_at
            .and_then(|deadline| deadline.checked_add(grace))
            .is_some_and(|cutoff| Instant::now() >= cutoff)
    }

    // == Time To Live ==
    /// Remaining lifetime, or None if the entry never expires.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl<T> Drop for Entry<T> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

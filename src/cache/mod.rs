//! Cache Module
//!
//! Provides the expiring keyed store: scalar and list entries with per-key
//! expiration timers, plus fixed-window rate-limit buckets.

mod entry;
mod ratelimit;
mod stats;
mod store;
mod value;


// Re-export public types
pub(crate) use entry::Entry;
pub(crate) use ratelimit::Bucket;
pub(crate) use stats::StatsRecorder;
pub use stats::StoreStats;
pub use store::{ExpiringStore, StoreValue, TIMER_GRACE};
pub use value::{Position, Shape, StoredValue};

/// Store holding arbitrary JSON-shaped values.
pub type JsonStore = ExpiringStore<serde_json::Value>;

//! Expiring Store - per-entity state that cleans up after itself
//!
//! Keyed scalar and list values with independent, cancelable time-to-live
//! timers, and fixed-window rate-limit counters, safe to share across tasks.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{ExpiringStore, JsonStore, Position, Shape, StoreStats, StoredValue};
pub use config::Config;
pub use error::{Result, StoreError};
pub use tasks::spawn_sweeper;

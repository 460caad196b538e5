//! Background Tasks Module
//!
//! # Tasks
//! - Sweeper: removes entries whose expiration timer was lost

mod sweeper;

pub use sweeper::spawn_sweeper;

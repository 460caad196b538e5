//! Error types for the expiring store
//!
//! Absence is never an error: missing keys surface as `None`, `false` or a
//! no-op. The only failure a caller can see is a shape conflict.

use thiserror::Error;

use crate::cache::Shape;

// == Store Error Enum ==
/// Unified error type for store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The operation expected one value shape but the key holds the other
    #[error("Type mismatch: key '{key}' holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: Shape,
        found: Shape,
    },
}

// == Result Type Alias ==
/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
